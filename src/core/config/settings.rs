use super::parsing::{
    env_optional, env_or_default, is_supported_audio_extension, is_supported_image_extension,
    parse_bool, parse_cors_origins, parse_environment, parse_string_list, parse_u64,
};
use super::types::{
    ApiSettings, ConfigError, CorsSettings, DatabaseSettings, ExamSettings, RuntimeSettings,
    ServerHost, ServerPort, ServerSettings, Settings, StorageSettings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("EXAMDESK_HOST", "0.0.0.0");
        let port = env_or_default("EXAMDESK_PORT", "8000");

        let environment =
            parse_environment(env_optional("EXAMDESK_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("EXAMDESK_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Examdesk API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let sqlite_path = env_or_default("SQLITE_PATH", "examdesk.db");
        let database_url = env_optional("DATABASE_URL");

        let storage_root = env_or_default("STORAGE_ROOT", "storage");
        let max_upload_size_mb =
            parse_u64("MAX_UPLOAD_SIZE_MB", env_or_default("MAX_UPLOAD_SIZE_MB", "20"))?;
        let allowed_audio_extensions =
            parse_string_list(env_optional("ALLOWED_AUDIO_EXTENSIONS"), &["mp3", "wav", "m4a"]);
        let allowed_image_extensions =
            parse_string_list(env_optional("ALLOWED_IMAGE_EXTENSIONS"), &["jpg", "jpeg", "png"]);

        let exam_duration_seconds =
            parse_u64("EXAM_DURATION_SECONDS", env_or_default("EXAM_DURATION_SECONDS", "3600"))?;
        let exam_warning_threshold_seconds = parse_u64(
            "EXAM_WARNING_THRESHOLD_SECONDS",
            env_or_default("EXAM_WARNING_THRESHOLD_SECONDS", "600"),
        )?;

        let log_level = env_or_default("EXAMDESK_LOG_LEVEL", "info");
        let json = env_optional("EXAMDESK_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings { sqlite_path, database_url },
            storage: StorageSettings {
                root: storage_root,
                max_upload_size_mb,
                allowed_audio_extensions,
                allowed_image_extensions,
            },
            exam: ExamSettings {
                duration_seconds: exam_duration_seconds,
                warning_threshold_seconds: exam_warning_threshold_seconds,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn storage(&self) -> &StorageSettings {
        &self.storage
    }

    pub(crate) fn exam(&self) -> &ExamSettings {
        &self.exam
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.allowed_image_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ALLOWED_IMAGE_EXTENSIONS",
                value: String::from("<empty>"),
            });
        }

        for extension in &self.storage.allowed_image_extensions {
            if !is_supported_image_extension(extension) {
                return Err(ConfigError::InvalidValue {
                    field: "ALLOWED_IMAGE_EXTENSIONS",
                    value: extension.clone(),
                });
            }
        }

        if self.storage.allowed_audio_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ALLOWED_AUDIO_EXTENSIONS",
                value: String::from("<empty>"),
            });
        }

        for extension in &self.storage.allowed_audio_extensions {
            if !is_supported_audio_extension(extension) {
                return Err(ConfigError::InvalidValue {
                    field: "ALLOWED_AUDIO_EXTENSIONS",
                    value: extension.clone(),
                });
            }
        }

        if self.exam.duration_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_DURATION_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.exam.warning_threshold_seconds >= self.exam.duration_seconds {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_WARNING_THRESHOLD_SECONDS",
                value: self.exam.warning_threshold_seconds.to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.sqlite_path.is_empty() {
            return Err(ConfigError::MissingSetting("DATABASE_URL/SQLITE_PATH"));
        }
        if self.storage.root.is_empty() {
            return Err(ConfigError::MissingSetting("STORAGE_ROOT"));
        }

        Ok(())
    }
}
