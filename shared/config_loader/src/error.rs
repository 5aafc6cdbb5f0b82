use thiserror::Error;

/// Tipo de resultado usado en toda la librería
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errores que pueden ocurrir durante la carga de configuración
#[derive(Debug, Error)]
pub enum ConfigError {
    /// El archivo de configuración no fue encontrado
    #[error("Archivo de configuración no encontrado: {0}")]
    FileNotFound(String),

    /// Error al leer el archivo
    #[error("Error al leer archivo de configuración: {0}")]
    ReadError(String),

    /// El contenido no es TOML válido o no coincide con el tipo esperado
    #[error("Error al parsear archivo de configuración: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_not_found() {
        let err = ConfigError::FileNotFound("relay.toml".to_string());
        assert_eq!(
            err.to_string(),
            "Archivo de configuración no encontrado: relay.toml"
        );
    }

    #[test]
    fn test_error_display_parse_error() {
        let err = ConfigError::ParseError("línea 3".to_string());
        assert!(err.to_string().contains("línea 3"));
    }
}
