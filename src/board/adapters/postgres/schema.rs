//! Diesel schema for board persistence.

diesel::table! {
    /// Task records with their position inside a `(board, status)` partition.
    tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Task title.
        #[max_length = 255]
        title -> Varchar,
        /// Short description.
        description -> Text,
        /// Status column.
        status_id -> Int4,
        /// Priority classifier.
        priority_id -> Int4,
        /// Type classifier.
        type_id -> Int4,
        /// Optional board scope.
        board_id -> Nullable<Uuid>,
        /// Optional creator.
        owner_id -> Nullable<Uuid>,
        /// Zero-based position within the partition.
        order_index -> Int4,
        /// Content document.
        content -> Jsonb,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Directed dependency edges between tasks.
    task_dependencies (dependent_task_id, dependency_task_id) {
        /// Task that waits.
        dependent_task_id -> Uuid,
        /// Task waited on.
        dependency_task_id -> Uuid,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only record of status and position changes.
    status_history (id) {
        /// Record identifier.
        id -> Uuid,
        /// Moved task.
        task_id -> Uuid,
        /// Board scope of the task.
        board_id -> Nullable<Uuid>,
        /// Status before the move.
        from_status_id -> Int4,
        /// Status after the move.
        to_status_id -> Int4,
        /// Position before the move.
        from_order -> Int4,
        /// Position after the move.
        to_order -> Int4,
        /// Optional reason.
        comment -> Nullable<Text>,
        /// Acting user.
        actor_id -> Nullable<Uuid>,
        /// When the move was committed.
        changed_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only audit log of task lifecycle events.
    audit_logs (id) {
        /// Entry identifier.
        id -> Uuid,
        /// Action name such as `task:moved`.
        #[max_length = 50]
        action -> Varchar,
        /// Task the event is about.
        task_id -> Uuid,
        /// Acting user.
        actor_id -> Nullable<Uuid>,
        /// Event payload.
        details -> Jsonb,
        /// When the event happened.
        occurred_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(tasks, task_dependencies, status_history, audit_logs);
