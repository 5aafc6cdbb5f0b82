//! # Config Loader
//!
//! Una librería genérica para cargar archivos de configuración TOML desde disco.
//!
//! ```no_run
//! use config_loader::{find_config_file, load_toml};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct MyConfig {
//!     port: u16,
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Opción 1: Buscar automáticamente
//!     let path = find_config_file("relay.toml")?;
//!     let config: MyConfig = load_toml(&path)?;
//!
//!     // Opción 2: Path específico, contenido crudo
//!     let content = config_loader::load_config_file("./config/relay.toml")?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;

pub use error::{ConfigError, Result};

use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Carga el contenido de un archivo de configuración.
///
/// Lee el archivo especificado y retorna su contenido como String.
/// No parsea ni valida el contenido.
///
/// # Ejemplos
///
/// ```no_run
/// use config_loader::load_config_file;
///
/// let content = load_config_file("./config/relay.toml")?;
/// println!("Config content: {}", content);
/// # Ok::<(), config_loader::ConfigError>(())
/// ```
pub fn load_config_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))
}

/// Parsea un texto TOML al tipo pedido.
///
/// Las claves ausentes se resuelven con los `#[serde(default)]` del tipo destino.
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Carga y parsea un archivo TOML.
///
/// # Ejemplos
///
/// ```no_run
/// use config_loader::load_toml;
///
/// let table: toml::Table = load_toml("./relay.toml")?;
/// # Ok::<(), config_loader::ConfigError>(())
/// ```
pub fn load_toml<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let content = load_config_file(path)?;
    parse_toml(&content)
}

/// Busca un archivo de configuración en ubicaciones comunes.
///
/// Busca en el siguiente orden:
/// 1. Variable de entorno `CONFIG_PATH` (si existe)
/// 2. `./config/{filename}`
/// 3. `./{filename}`
///
/// # Ejemplos
///
/// ```no_run
/// use config_loader::find_config_file;
///
/// let path = find_config_file("relay.toml")?;
/// println!("Found config at: {}", path.display());
/// # Ok::<(), config_loader::ConfigError>(())
/// ```
pub fn find_config_file(filename: &str) -> Result<PathBuf> {
    // 1. Check environment variable
    if let Ok(path) = env::var("CONFIG_PATH") {
        let path_buf = PathBuf::from(&path);
        if path_buf.exists() {
            return Ok(path_buf);
        }
    }

    // 2. Check ./config/{filename}
    let config_dir = PathBuf::from("./config").join(filename);
    if config_dir.exists() {
        return Ok(config_dir);
    }

    // 3. Check ./{filename}
    let current_dir = PathBuf::from("./").join(filename);
    if current_dir.exists() {
        return Ok(current_dir);
    }

    Err(ConfigError::FileNotFound(format!(
        "No se encontró '{}'. Buscado en: CONFIG_PATH env var, ./config/{}, ./{}",
        filename, filename, filename
    )))
}

/// Busca y carga un archivo de configuración automáticamente.
///
/// Combina `find_config_file` y `load_config_file` en un solo paso.
pub fn find_and_load(filename: &str) -> Result<String> {
    let path = find_config_file(filename)?;
    load_config_file(path)
}

/// Busca, carga y parsea un archivo TOML en un solo paso.
pub fn find_and_load_toml<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = find_config_file(filename)?;
    load_toml(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        port: u16,
        name: String,
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                port: 5004,
                name: "relay".to_string(),
            }
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = load_config_file("/path/that/does/not/exist.toml");
        assert!(result.is_err());
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_find_nonexistent_file() {
        let result = find_config_file("file_that_definitely_does_not_exist_12345.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_toml_fills_defaults() {
        let sample: Sample = parse_toml("port = 6000").unwrap();
        assert_eq!(sample.port, 6000);
        assert_eq!(sample.name, "relay");
    }

    #[test]
    fn test_parse_toml_rejects_wrong_type() {
        let result: Result<Sample> = parse_toml("port = \"not a number\"");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_toml_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name = \"edge\"").unwrap();

        let sample: Sample = load_toml(file.path()).unwrap();
        assert_eq!(sample, Sample { port: 5004, name: "edge".to_string() });
    }
}
