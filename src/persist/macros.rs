/// Declares a model type backed by a named collection.
///
/// ```ignore
/// model! {
///     pub struct Article in "articles" {
///         meta: Attribute::of(ValueKind::String),
///         delta: Attribute::of(ValueKind::String).default(""),
///     }
/// }
/// ```
///
/// The type wraps an [`Instance`](crate::persist::Instance) and derefs to
/// it. Each declared field gets `field()`, `set_field()` and
/// `unset_field()` accessors.
#[macro_export]
macro_rules! model {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident in $collection:literal {
            $($field:ident : $attribute:expr),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            __instance: $crate::persist::Instance,
        }

        impl $crate::persist::Model for $name {
            fn schema() -> &'static $crate::schema::Schema {
                $crate::lazy_static::lazy_static! {
                    static ref SCHEMA: $crate::schema::Schema =
                        $crate::schema::Schema::builder($collection)
                            $(.field(stringify!($field), $attribute))*
                            .build();
                }
                &SCHEMA
            }

            fn from_instance(instance: $crate::persist::Instance) -> Self {
                Self { __instance: instance }
            }

            fn instance(&self) -> &$crate::persist::Instance {
                &self.__instance
            }

            fn instance_mut(&mut self) -> &mut $crate::persist::Instance {
                &mut self.__instance
            }
        }

        impl Default for $name {
            fn default() -> Self {
                <Self as $crate::persist::Model>::create()
            }
        }

        impl std::ops::Deref for $name {
            type Target = $crate::persist::Instance;

            fn deref(&self) -> &Self::Target {
                &self.__instance
            }
        }

        impl std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.__instance
            }
        }

        $crate::paste::paste! {
            impl $name {
                $(
                    pub fn $field(&self) -> $crate::serde_json::Value {
                        self.__instance.get(stringify!($field)).unwrap_or_default()
                    }

                    pub fn [<set_ $field>](
                        &mut self,
                        value: impl Into<$crate::serde_json::Value>,
                    ) -> $crate::core::Result<()> {
                        self.__instance.set(stringify!($field), value)
                    }

                    pub fn [<unset_ $field>](&mut self) -> $crate::core::Result<()> {
                        self.__instance.unset(stringify!($field))
                    }
                )*
            }
        }
    };
}
