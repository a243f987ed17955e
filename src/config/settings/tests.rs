use super::*;
use tempfile::TempDir;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.model, "all-minilm:latest");
    assert_eq!(config.ollama.batch_size, 16);
    assert_eq!(config.ollama.embedding_dimension, 384);
    assert_eq!(config.generation.model, "tinyllama:latest");
    assert_eq!(config.generation.max_tokens, 512);
    assert_eq!(config.generation.max_prompt_tokens, 2048);
    assert_eq!(config.generation.device, Device::Auto);
    assert_eq!(config.retrieval.top_k, 5);
    assert!(!config.chunking.enabled);
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.overlap, 200);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.generation.temperature = 2.5;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTemperature(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.generation.model = "  ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.top_k = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTopK(0))
    ));

    let mut invalid_config = config;
    invalid_config.chunking.overlap = 1000;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::OverlapTooLarge(1000, 1000))
    ));
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let parsed: Config = toml::from_str(
        r#"
        [ollama]
        host = "gpu-box"

        [chunking]
        enabled = true
        "#,
    )
    .expect("should parse partial toml");

    assert_eq!(parsed.ollama.host, "gpu-box");
    assert_eq!(parsed.ollama.port, 11434);
    assert!(parsed.chunking.enabled);
    assert_eq!(parsed.chunking.chunk_size, 1000);
    assert_eq!(parsed.generation, GenerationConfig::default());
}

#[test]
fn load_missing_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load_with_env(temp_dir.path(), no_env).expect("should load defaults");

    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.ollama, OllamaConfig::default());
    assert_eq!(config.documents_path(), temp_dir.path().join("documents"));
    assert_eq!(config.vector_database_path(), temp_dir.path().join("vectors"));
}

#[test]
fn save_then_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().join("nested"),
        ..Config::default()
    };
    config.generation.device = Device::Cpu;
    config.retrieval.top_k = 3;

    config.save().expect("should save config");
    let loaded = Config::load_with_env(temp_dir.path().join("nested"), no_env)
        .expect("should load saved config");

    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\ntop_k = 0\n",
    )
    .expect("should write config");

    assert!(Config::load_with_env(temp_dir.path(), no_env).is_err());
}

#[test]
fn device_env_override() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load_with_env(temp_dir.path(), |key| {
        (key == DEVICE_ENV_VAR).then(|| "cpu".to_string())
    })
    .expect("should load with override");
    assert_eq!(config.generation.device, Device::Cpu);

    let result = Config::load_with_env(temp_dir.path(), |key| {
        (key == DEVICE_ENV_VAR).then(|| "tpu".to_string())
    });
    assert!(result.is_err());
}

#[test]
fn device_parsing() {
    assert_eq!("CUDA".parse::<Device>().expect("cuda parses"), Device::Gpu);
    assert_eq!("gpu".parse::<Device>().expect("gpu parses"), Device::Gpu);
    assert_eq!(" cpu ".parse::<Device>().expect("cpu parses"), Device::Cpu);
    assert_eq!("".parse::<Device>().expect("empty parses"), Device::Auto);
    assert!("metal".parse::<Device>().is_err());
    assert_eq!(Device::Cpu.to_string(), "cpu");
}

#[test]
fn documents_directory_override() {
    let config = Config {
        base_dir: PathBuf::from("/data"),
        documents: DocumentsConfig {
            directory: Some(PathBuf::from("/srv/pdfs")),
        },
        ..Config::default()
    };

    assert_eq!(config.documents_path(), PathBuf::from("/srv/pdfs"));
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_protocol("https".to_string()).is_ok());
    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert!(config.set_model("new-model".to_string()).is_ok());
    assert!(config.set_batch_size(128).is_ok());
    assert!(config.set_embedding_dimension(768).is_ok());

    assert!(config.set_protocol("ftp".to_string()).is_err());
    assert!(config.set_protocol("HTTP".to_string()).is_err());
    assert!(config.set_port(0).is_err());
    assert!(config.set_model(String::new()).is_err());
    assert!(config.set_batch_size(0).is_err());
    assert!(config.set_embedding_dimension(8).is_err());

    let mut generation = GenerationConfig::default();
    assert!(generation.set_temperature(0.0).is_ok());
    assert!(generation.set_temperature(-0.1).is_err());
    assert!(generation.set_max_tokens(0).is_err());
    assert!(generation.set_model("llama3.2".to_string()).is_ok());
}
