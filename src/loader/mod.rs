// Module: Loader
// Lê desafios (um ou um catálogo) e submissões do disco, com erros
// tipados por causa: a CLI decide o código de erro pelo variant.

use crate::protocol::Challenge;
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Erros de carregamento de desafios e submissões.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Arquivo inacessível (caminho errado, permissão, etc.).
    #[error("Failed to read {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },

    /// O arquivo não é JSON válido, ou o JSON não é um desafio.
    #[error("Failed to parse challenge JSON in {path}: {source}")]
    InvalidJson {
        path: String,
        source: serde_json::Error,
    },

    /// O JSON parseia mas não tem a forma esperada.
    #[error("Challenge file {path} must contain an object or an array")]
    WrongShape { path: String },
}

/// Carrega um arquivo de desafios: aceita um objeto único ou um array
/// (catálogo). Sempre devolve um vetor.
pub fn load_challenges_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<Challenge>, LoadError> {
    let shown = path.as_ref().display().to_string();

    let content = fs::read_to_string(&path).map_err(|source| LoadError::Unreadable {
        path: shown.clone(),
        source,
    })?;
    let raw: Value = serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson {
        path: shown.clone(),
        source,
    })?;

    match raw {
        Value::Array(_) | Value::Object(_) => {
            let is_catalog = raw.is_array();
            if is_catalog {
                serde_json::from_value(raw).map_err(|source| LoadError::InvalidJson {
                    path: shown,
                    source,
                })
            } else {
                let challenge: Challenge =
                    serde_json::from_value(raw).map_err(|source| LoadError::InvalidJson {
                        path: shown,
                        source,
                    })?;
                Ok(vec![challenge])
            }
        }
        _ => Err(LoadError::WrongShape { path: shown }),
    }
}

/// Lê o texto de uma submissão.
pub fn load_submission_from_file<P: AsRef<Path>>(path: P) -> Result<String, LoadError> {
    let shown = path.as_ref().display().to_string();
    fs::read_to_string(&path).map_err(|source| LoadError::Unreadable { path: shown, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("challenge-{}.json", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_single_challenge() {
        let path = temp_file(
            r#"{
                "id": "array-sort-easy",
                "difficulty": "easy",
                "initialData": [2, 1],
                "assertions": "expect(result).toEqual([1, 2]);"
            }"#,
        );
        let challenges = load_challenges_from_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(challenges.len(), 1);
        assert_eq!(challenges[0].id, "array-sort-easy");
    }

    #[test]
    fn test_load_catalog() {
        let path = temp_file(
            r#"[
                { "id": "a-easy", "difficulty": "easy", "assertions": "" },
                { "id": "b-hard", "difficulty": "hard", "assertions": "" }
            ]"#,
        );
        let challenges = load_challenges_from_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(challenges.len(), 2);
    }

    #[test]
    fn test_load_rejects_scalar_with_shape_error() {
        let path = temp_file("42");
        let error = load_challenges_from_file(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert!(matches!(error, LoadError::WrongShape { .. }));
        assert!(error.to_string().contains("object or an array"));
    }

    #[test]
    fn test_invalid_json_variant() {
        let path = temp_file("{ not json");
        let error = load_challenges_from_file(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert!(matches!(error, LoadError::InvalidJson { .. }));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let error = load_challenges_from_file("/nonexistent/challenges.json").unwrap_err();
        assert!(matches!(error, LoadError::Unreadable { .. }));
        assert!(error.to_string().contains("Failed to read"));
    }
}
