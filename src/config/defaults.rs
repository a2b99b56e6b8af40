use super::*;

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.sev.fo/api/CustomerRESTApi/";

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_name: String::new(),
            api_key: String::new(),
            request_timeout_secs: 10,
            token_max_age_secs: 3 * 3600,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            min_refresh_interval_secs: 30 * 60,
            scan_interval_secs: 300,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/sevmeter.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8089,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            polling: PollingConfig::default(),
            timezone: String::new(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
        }
    }
}
