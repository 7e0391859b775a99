/// Collection that holds the migration checkpoint.
pub const CHECKPOINT_COLLECTION: &str = "_migration";

/// Common key-construction helpers used across docshift.
#[derive(Debug, Clone)]
pub struct KeyContext<'a> {
    pub prefix: &'a str,
}

impl<'a> KeyContext<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    pub fn document(&self, collection: &str, document_id: &str) -> String {
        format!("{}:{}:{}", self.prefix, collection, document_id)
    }

    /// SCAN pattern matching every document of a collection.
    pub fn collection_pattern(&self, collection: &str) -> String {
        format!("{}:{}:*", self.prefix, collection)
    }

    pub fn checkpoint(&self) -> String {
        format!("{}:{}", self.prefix, CHECKPOINT_COLLECTION)
    }
}

/// Extract the document ID from a key (the last `:` segment).
pub fn document_id_from_key(key: &str) -> &str {
    key.rsplit(':').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_document_keys() {
        let ctx = KeyContext::new("app");
        assert_eq!(ctx.document("users", "abc"), "app:users:abc");
        assert_eq!(ctx.collection_pattern("users"), "app:users:*");
        assert_eq!(ctx.checkpoint(), "app:_migration");
    }

    #[test]
    fn extracts_document_ids() {
        assert_eq!(document_id_from_key("app:users:abc123"), "abc123");
        assert_eq!(document_id_from_key("simple"), "simple");
        assert_eq!(document_id_from_key("users:"), "");
    }
}
