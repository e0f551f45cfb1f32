//! SQL file parsing for query sources

use crate::error::{Result, RowdiffError};
use std::env;
use std::fs;
use std::path::Path;

/// A parsed SQL file with connection information
#[derive(Debug, Clone)]
pub struct SqlFile {
    /// `ATTACH ...` statement from a leading comment, placeholders substituted.
    pub connection_string: String,
    /// Statements that run before the query (`USE`, `CREATE`, ...).
    pub setup: Vec<String>,
    pub query: String,
    pub source_path: std::path::PathBuf,
}

/// Parse a SQL file to extract connection string, setup statements and query
pub fn parse_sql_file(file_path: &Path) -> Result<SqlFile> {
    let content = fs::read_to_string(file_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RowdiffError::not_found(file_path.display().to_string())
        } else {
            RowdiffError::invalid_input(format!(
                "Failed to read SQL file '{}': {}",
                file_path.display(),
                e
            ))
        }
    })?;

    let mut connection_string = String::new();
    let mut setup = Vec::new();
    let mut query_lines = Vec::new();
    let mut in_select_query = false;

    for line in content.lines() {
        let trimmed = line.trim();

        let comment = trimmed
            .strip_prefix("--")
            .or_else(|| trimmed.strip_prefix("//"));
        if let Some(comment) = comment {
            let comment = comment.trim();
            if comment.to_uppercase().starts_with("ATTACH") {
                connection_string = substitute_env_vars(comment)?;
            }
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.to_uppercase().starts_with("SELECT")
            || trimmed.to_uppercase().starts_with("WITH")
        {
            in_select_query = true;
        }
        if in_select_query {
            query_lines.push(line);
        } else {
            setup.push(trimmed.to_string());
        }
    }

    if query_lines.is_empty() {
        return Err(RowdiffError::invalid_input(format!(
            "No SELECT query found in file '{}'",
            file_path.display()
        )));
    }

    let query = query_lines
        .join("\n")
        .trim()
        .trim_end_matches(';')
        .trim()
        .to_string();

    Ok(SqlFile {
        connection_string,
        setup,
        query,
        source_path: file_path.to_path_buf(),
    })
}

/// Substitute `{VAR_NAME}` placeholders with environment variables
pub fn substitute_env_vars(connection_string: &str) -> Result<String> {
    let mut result = connection_string.to_string();

    let mut start = 0;
    while let Some(open_pos) = result[start..].find('{') {
        let open_pos = start + open_pos;
        if let Some(close_pos) = result[open_pos..].find('}') {
            let close_pos = open_pos + close_pos;
            let var_name = &result[open_pos + 1..close_pos];

            let var_value = env::var(var_name).map_err(|_| {
                RowdiffError::config(format!("Environment variable '{}' not found", var_name))
            })?;

            result.replace_range(open_pos..=close_pos, &var_value);
            start = open_pos + var_value.len();
        } else {
            start = open_pos + 1;
        }
    }

    Ok(result)
}

/// Check if a file is a SQL file
pub fn is_sql_file(file_path: &Path) -> bool {
    file_path
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("sql"))
        .unwrap_or(false)
}
