//! CQL schema for the messaging keyspace.

use parley_core::ParleyConfig;

/// `CREATE KEYSPACE` statement.
pub fn create_keyspace(keyspace: &str, replication_factor: u32) -> String {
    format!(
        "CREATE KEYSPACE IF NOT EXISTS {keyspace} \
         WITH REPLICATION = {{ 'class': 'SimpleStrategy', 'replication_factor': {replication_factor} }}"
    )
}

pub fn create_users_table(keyspace: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {keyspace}.users (\n\
         \x20   user_id bigint PRIMARY KEY\n\
         )"
    )
}

pub fn create_messages_table(keyspace: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {keyspace}.messages (\n\
         \x20   conversation_id text,\n\
         \x20   message_id uuid,\n\
         \x20   sender_id bigint,\n\
         \x20   recipient_id bigint,\n\
         \x20   message_text text,\n\
         \x20   PRIMARY KEY (conversation_id, message_id)\n\
         ) WITH CLUSTERING ORDER BY (message_id DESC)"
    )
}

pub fn create_user_conversations_table(keyspace: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {keyspace}.user_conversations (\n\
         \x20   user_id bigint,\n\
         \x20   last_message_time uuid,\n\
         \x20   conversation_id text,\n\
         \x20   receiver_id bigint,\n\
         \x20   last_message text,\n\
         \x20   PRIMARY KEY (user_id, last_message_time, conversation_id)\n\
         ) WITH CLUSTERING ORDER BY (last_message_time DESC, conversation_id ASC)"
    )
}

/// All bootstrap statements, keyspace first.
pub fn statements(config: &ParleyConfig) -> Vec<String> {
    vec![
        create_keyspace(&config.keyspace, config.replication_factor),
        create_users_table(&config.keyspace),
        create_messages_table(&config.keyspace),
        create_user_conversations_table(&config.keyspace),
    ]
}

/// Bootstrap script, one `;`-terminated statement per block.
pub fn render(config: &ParleyConfig) -> String {
    statements(config)
        .into_iter()
        .map(|statement| format!("{statement};\n"))
        .collect::<Vec<_>>()
        .join("\n")
}
