//! Diesel schema for server version persistence.

diesel::table! {
    /// Published server version records, one row per `(name, version)`.
    servers (server_name, version) {
        /// Namespaced server name.
        #[max_length = 200]
        server_name -> Varchar,
        /// Version token supplied at publish.
        #[max_length = 255]
        version -> Varchar,
        /// Lifecycle status (active, deprecated, deleted).
        #[max_length = 50]
        status -> Varchar,
        /// Optional status note, capped at 500 characters by a CHECK.
        status_message -> Nullable<Text>,
        /// Full descriptor payload as JSONB.
        descriptor -> Jsonb,
        /// First publish timestamp. Immutable.
        published_at -> Timestamptz,
        /// Last real status change; CHECKed to not precede `published_at`.
        status_changed_at -> Timestamptz,
        /// Last mutation of any kind.
        updated_at -> Timestamptz,
        /// Whether this row is the canonical version for its name.
        is_latest -> Bool,
    }
}
