// ABOUTME: Destination DDL for the application's domain tables
// ABOUTME: Created on the MySQL side before copying so foreign keys and unique keys exist

/// `CREATE TABLE IF NOT EXISTS` statement for a known table
pub fn table_ddl(table: &str) -> Option<&'static str> {
    DOMAIN_TABLES
        .iter()
        .find(|(name, _)| *name == table)
        .map(|(_, ddl)| *ddl)
}

/// Known tables with their DDL, in dependency order
pub const DOMAIN_TABLES: &[(&str, &str)] = &[
    (
        "telegram_accounts",
        r#"CREATE TABLE IF NOT EXISTS `telegram_accounts` (
            `id` INT NOT NULL AUTO_INCREMENT,
            `phone_number` VARCHAR(20) NOT NULL,
            `display_name` VARCHAR(100) NULL,
            `api_id` INT NOT NULL,
            `api_hash` VARCHAR(64) NOT NULL,
            `session_string` TEXT NULL,
            `is_connected` TINYINT(1) NULL,
            `is_active` TINYINT(1) NULL,
            `is_authorized` TINYINT(1) NULL,
            `total_unread_count` INT NULL,
            `last_seen` DATETIME(6) NULL,
            `celery_task_id` VARCHAR(255) NULL,
            `last_heartbeat` DATETIME(6) NULL,
            `phone_code_hash` VARCHAR(255) NULL,
            `created_at` DATETIME(6) NULL,
            PRIMARY KEY (`id`),
            UNIQUE KEY `uq_telegram_accounts_phone_number` (`phone_number`)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    ),
    (
        "telegram_sessions_db",
        r#"CREATE TABLE IF NOT EXISTS `telegram_sessions_db` (
            `id` INT NOT NULL AUTO_INCREMENT,
            `phone_number` VARCHAR(20) NOT NULL,
            `dc_id` INT NULL,
            `server_address` VARCHAR(100) NULL,
            `port` INT NULL,
            `auth_key` BLOB NULL,
            `created_at` DATETIME(6) NULL,
            `updated_at` DATETIME(6) NULL,
            PRIMARY KEY (`id`),
            UNIQUE KEY `ix_telegram_sessions_db_phone_number` (`phone_number`)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    ),
    (
        "telegram_chats",
        r#"CREATE TABLE IF NOT EXISTS `telegram_chats` (
            `id` INT NOT NULL AUTO_INCREMENT,
            `account_id` INT NOT NULL,
            `chat_id` BIGINT NOT NULL,
            `chat_title` VARCHAR(255) NULL,
            `chat_type` VARCHAR(20) NULL,
            `unread_count` INT NULL,
            `last_message_preview` VARCHAR(200) NULL,
            `last_message_at` DATETIME(6) NULL,
            `is_pinned` TINYINT(1) NULL,
            `is_manually_pinned` TINYINT(1) NULL,
            `cta_sent` TINYINT(1) NULL,
            `created_at` DATETIME(6) NULL,
            PRIMARY KEY (`id`),
            UNIQUE KEY `uq_account_chat` (`account_id`, `chat_id`),
            CONSTRAINT `fk_telegram_chats_account` FOREIGN KEY (`account_id`)
                REFERENCES `telegram_accounts` (`id`)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    ),
    (
        "telegram_messages",
        r#"CREATE TABLE IF NOT EXISTS `telegram_messages` (
            `id` INT NOT NULL AUTO_INCREMENT,
            `account_id` INT NOT NULL,
            `chat_db_id` INT NOT NULL,
            `chat_id` BIGINT NOT NULL,
            `message_id` INT NOT NULL,
            `sender_name` VARCHAR(255) NULL,
            `sender_id` BIGINT NULL,
            `text` TEXT NULL,
            `media_type` VARCHAR(50) NULL,
            `is_incoming` TINYINT(1) NULL,
            `is_auto_reply` TINYINT(1) NULL,
            `timestamp` DATETIME(6) NOT NULL,
            `created_at` DATETIME(6) NULL,
            PRIMARY KEY (`id`),
            UNIQUE KEY `uq_account_chat_message` (`account_id`, `chat_id`, `message_id`),
            KEY `ix_telegram_messages_lookup` (`account_id`, `chat_id`, `timestamp`),
            CONSTRAINT `fk_telegram_messages_account` FOREIGN KEY (`account_id`)
                REFERENCES `telegram_accounts` (`id`),
            CONSTRAINT `fk_telegram_messages_chat` FOREIGN KEY (`chat_db_id`)
                REFERENCES `telegram_chats` (`id`)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    ),
    (
        "telegram_media_folders",
        r#"CREATE TABLE IF NOT EXISTS `telegram_media_folders` (
            `id` INT NOT NULL AUTO_INCREMENT,
            `name` VARCHAR(100) NOT NULL,
            `folder_path` VARCHAR(500) NULL,
            `folder_type` VARCHAR(20) NULL,
            `description` VARCHAR(255) NULL,
            `is_active` TINYINT(1) NULL,
            `created_at` DATETIME(6) NULL,
            `account_scope` VARCHAR(20) NULL,
            PRIMARY KEY (`id`)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    ),
    (
        "telegram_media_files",
        r#"CREATE TABLE IF NOT EXISTS `telegram_media_files` (
            `id` INT NOT NULL AUTO_INCREMENT,
            `folder_id` INT NOT NULL,
            `filename` VARCHAR(255) NOT NULL,
            `original_name` VARCHAR(255) NULL,
            `file_path` VARCHAR(500) NOT NULL,
            `file_size` INT NULL,
            `mime_type` VARCHAR(100) NULL,
            `is_used` TINYINT(1) NULL,
            `used_count` INT NULL,
            `auto_send_enabled` TINYINT(1) NULL,
            `uploaded_at` DATETIME(6) NULL,
            PRIMARY KEY (`id`),
            CONSTRAINT `fk_telegram_media_files_folder` FOREIGN KEY (`folder_id`)
                REFERENCES `telegram_media_folders` (`id`)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    ),
    (
        "telegram_media_folder_accounts",
        r#"CREATE TABLE IF NOT EXISTS `telegram_media_folder_accounts` (
            `id` INT NOT NULL AUTO_INCREMENT,
            `folder_id` INT NOT NULL,
            `account_id` INT NOT NULL,
            PRIMARY KEY (`id`),
            UNIQUE KEY `uq_folder_account` (`folder_id`, `account_id`),
            CONSTRAINT `fk_media_folder_accounts_folder` FOREIGN KEY (`folder_id`)
                REFERENCES `telegram_media_folders` (`id`),
            CONSTRAINT `fk_media_folder_accounts_account` FOREIGN KEY (`account_id`)
                REFERENCES `telegram_accounts` (`id`)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    ),
    (
        "telegram_profiles",
        r#"CREATE TABLE IF NOT EXISTS `telegram_profiles` (
            `id` INT NOT NULL AUTO_INCREMENT,
            `name` VARCHAR(100) NOT NULL,
            `username` VARCHAR(100) NOT NULL,
            `age` VARCHAR(10) NULL,
            `city` VARCHAR(100) NULL,
            `job` VARCHAR(200) NULL,
            `hobbies` VARCHAR(500) NULL,
            `flirt_level` VARCHAR(20) NULL,
            `location_mode` VARCHAR(20) NULL,
            `is_active` TINYINT(1) NULL,
            `settings_json` TEXT NULL,
            `cta_json` TEXT NULL,
            `created_at` DATETIME(6) NULL,
            PRIMARY KEY (`id`)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    ),
    (
        "telegram_profile_accounts",
        r#"CREATE TABLE IF NOT EXISTS `telegram_profile_accounts` (
            `id` INT NOT NULL AUTO_INCREMENT,
            `profile_id` INT NOT NULL,
            `account_id` INT NOT NULL,
            PRIMARY KEY (`id`),
            UNIQUE KEY `uq_profile_account` (`profile_id`, `account_id`),
            CONSTRAINT `fk_profile_accounts_profile` FOREIGN KEY (`profile_id`)
                REFERENCES `telegram_profiles` (`id`),
            CONSTRAINT `fk_profile_accounts_account` FOREIGN KEY (`account_id`)
                REFERENCES `telegram_accounts` (`id`)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    ),
    (
        "ai_configs",
        r#"CREATE TABLE IF NOT EXISTS `ai_configs` (
            `id` INT NOT NULL AUTO_INCREMENT,
            `provider` VARCHAR(20) NULL,
            `api_key` VARCHAR(255) NULL,
            `model` VARCHAR(100) NULL,
            `system_prompt` TEXT NULL,
            `auto_reply_enabled` TINYINT(1) NULL,
            `auto_reply_scope` VARCHAR(20) NULL,
            `max_tokens` INT NULL,
            `temperature` FLOAT NULL,
            `created_at` DATETIME(6) NULL,
            `updated_at` DATETIME(6) NULL,
            PRIMARY KEY (`id`)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    ),
    (
        "ai_auto_reply_accounts",
        r#"CREATE TABLE IF NOT EXISTS `ai_auto_reply_accounts` (
            `id` INT NOT NULL AUTO_INCREMENT,
            `config_id` INT NOT NULL,
            `account_id` INT NOT NULL,
            PRIMARY KEY (`id`),
            UNIQUE KEY `uq_config_account` (`config_id`, `account_id`),
            CONSTRAINT `fk_auto_reply_accounts_config` FOREIGN KEY (`config_id`)
                REFERENCES `ai_configs` (`id`),
            CONSTRAINT `fk_auto_reply_accounts_account` FOREIGN KEY (`account_id`)
                REFERENCES `telegram_accounts` (`id`)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    ),
    (
        "blacklist_entries",
        r#"CREATE TABLE IF NOT EXISTS `blacklist_entries` (
            `id` INT NOT NULL AUTO_INCREMENT,
            `account_id` INT NOT NULL,
            `chat_id` BIGINT NOT NULL,
            `feature` VARCHAR(30) NOT NULL DEFAULT 'cta',
            `created_at` DATETIME(6) NULL,
            PRIMARY KEY (`id`),
            UNIQUE KEY `uq_blacklist_account_chat_feature` (`account_id`, `chat_id`, `feature`),
            KEY `ix_blacklist_feature` (`feature`)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    ),
];
