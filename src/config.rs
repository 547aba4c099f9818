/// Session configuration
///
/// Controls how model collections are named and how reads and writes are
/// shaped before they reach the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Database name, used as the collection namespace (`"{database}.{collection}"`).
    /// Empty means collections are used unprefixed.
    pub database: String,

    /// Whether free-text search ignores case
    pub case_insensitive_search: bool,

    /// Whether saves look up `unique` attributes before writing
    pub check_unique: bool,
}

impl SessionConfig {
    /// Create a configuration for the given database
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            case_insensitive_search: true,
            check_unique: true,
        }
    }

    /// Set the database name
    pub fn database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    /// Set search case sensitivity
    pub fn case_insensitive_search(mut self, enabled: bool) -> Self {
        self.case_insensitive_search = enabled;
        self
    }

    /// Enable or disable uniqueness pre-checks
    pub fn check_unique(mut self, enabled: bool) -> Self {
        self.check_unique = enabled;
        self
    }

    /// Physical name of a model's collection in the store
    pub fn collection_name(&self, collection: &str) -> String {
        if self.database.is_empty() {
            collection.to_string()
        } else {
            format!("{}.{}", self.database, collection)
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("consys")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.database, "consys");
        assert!(config.case_insensitive_search);
        assert!(config.check_unique);
    }

    #[test]
    fn test_builder_pattern() {
        let config = SessionConfig::new("app")
            .case_insensitive_search(false)
            .check_unique(false);

        assert_eq!(config.database, "app");
        assert!(!config.case_insensitive_search);
        assert!(!config.check_unique);
    }

    #[test]
    fn test_collection_name() {
        assert_eq!(SessionConfig::new("app").collection_name("users"), "app.users");
        assert_eq!(SessionConfig::new("").collection_name("users"), "users");
    }
}
