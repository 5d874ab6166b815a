use crate::utils::error::{EtlError, Result};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// 資產 URL 模板必須是 http(s) 且含有 `{hero}` 佔位符
pub fn validate_url_template(field_name: &str, template: &str, placeholder: &str) -> Result<()> {
    if template.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: template.to_string(),
            reason: "URL template cannot be empty".to_string(),
        });
    }

    if !template.contains(placeholder) {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: template.to_string(),
            reason: format!("URL template must contain the {} placeholder", placeholder),
        });
    }

    // 用範例值替換後再解析，佔位符本身不是合法的 URL 片段
    let sample = template.replace(placeholder, "sample");
    match Url::parse(&sample) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(EtlError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: template.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: template.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_file_extensions(
    field_name: &str,
    files: &[&str],
    allowed_extensions: &[&str],
) -> Result<()> {
    let allowed_set: HashSet<&str> = allowed_extensions.iter().copied().collect();

    for file in files {
        match std::path::Path::new(file)
            .extension()
            .and_then(|ext| ext.to_str())
        {
            Some(extension) if allowed_set.contains(extension) => {}
            Some(extension) => {
                return Err(EtlError::InvalidConfigValueError {
                    field: field_name.to_string(),
                    value: file.to_string(),
                    reason: format!(
                        "Unsupported file extension: {}. Allowed extensions: {}",
                        extension,
                        allowed_extensions.join(", ")
                    ),
                });
            }
            None => {
                return Err(EtlError::InvalidConfigValueError {
                    field: field_name.to_string(),
                    value: file.to_string(),
                    reason: "File has no extension or invalid filename".to_string(),
                });
            }
        }
    }

    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_template() {
        let ok = "https://game.example.com/champions/{hero}.png";
        assert!(validate_url_template("asset_url_template", ok, "{hero}").is_ok());
        assert!(validate_url_template("asset_url_template", "http://x.test/{hero}", "{hero}").is_ok());
        assert!(validate_url_template("asset_url_template", "", "{hero}").is_err());
        assert!(
            validate_url_template("asset_url_template", "https://x.test/a.png", "{hero}").is_err()
        );
        assert!(validate_url_template("asset_url_template", "ftp://x.test/{hero}", "{hero}").is_err());
        assert!(validate_url_template("asset_url_template", "not a url {hero}", "{hero}").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("concurrent_downloads", 4, 1).is_ok());
        assert!(validate_positive_number("concurrent_downloads", 0, 1).is_err());
    }

    #[test]
    fn test_validate_file_extensions() {
        assert!(validate_file_extensions("input", &["trait.json", "chess.json"], &["json"]).is_ok());
        assert!(validate_file_extensions("input", &["trait.csv"], &["json"]).is_err());
        assert!(validate_file_extensions("input", &["trait"], &["json"]).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("run_timeout_secs", 600u64, 1, 86_400).is_ok());
        assert!(validate_range("run_timeout_secs", 0u64, 1, 86_400).is_err());
    }
}
