//! Logical type tokens to backend column types.

use crate::types::BackendType;

const INTEGER_TOKENS: &[&str] = &["INT", "INTEGER", "SMALLINT", "BIGINT", "TINYINT"];

/// Resolve a caller-supplied logical type token.
///
/// Matching is case-insensitive and never fails: absent, empty, or unrecognised tokens resolve
/// to [`BackendType::Text`]. Parameters such as `(18,2)` or `(MAX)` are ignored.
pub fn map_logical_type(token: Option<&str>) -> BackendType {
    let Some(token) = token else {
        return BackendType::Text;
    };
    let normalized = token.trim().to_ascii_uppercase();
    let base = normalized
        .split('(')
        .next()
        .unwrap_or_default()
        .trim();

    if normalized.contains("CHAR") || normalized.contains("TEXT") {
        BackendType::Text
    } else if INTEGER_TOKENS.contains(&base) {
        BackendType::Integer
    } else if ["FLOAT", "DOUBLE", "REAL"].iter().any(|p| base.starts_with(p)) {
        BackendType::Double
    } else if ["DECIMAL", "NUMERIC", "MONEY"].iter().any(|p| base.starts_with(p)) {
        BackendType::Numeric
    } else if base.starts_with("DATETIME") || base.starts_with("TIMESTAMP") {
        BackendType::Timestamp
    } else {
        match base {
            "DATE" => BackendType::Date,
            "TIME" => BackendType::Time,
            "BIT" | "BOOL" | "BOOLEAN" => BackendType::Boolean,
            "UUID" | "UNIQUEIDENTIFIER" => BackendType::Uuid,
            "JSON" | "JSONB" => BackendType::Json,
            _ => BackendType::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_like_tokens() {
        for t in ["VARCHAR(255)", "nvarchar(max)", "char", "TEXT", "longtext"] {
            assert_eq!(map_logical_type(Some(t)), BackendType::Text, "{t}");
        }
    }

    #[test]
    fn numeric_families() {
        assert_eq!(map_logical_type(Some("int")), BackendType::Integer);
        assert_eq!(map_logical_type(Some(" BIGINT ")), BackendType::Integer);
        assert_eq!(map_logical_type(Some("INTERVAL")), BackendType::Text);
        assert_eq!(map_logical_type(Some("double precision")), BackendType::Double);
        assert_eq!(map_logical_type(Some("REAL")), BackendType::Double);
        assert_eq!(map_logical_type(Some("DECIMAL(18,2)")), BackendType::Numeric);
        assert_eq!(map_logical_type(Some("MONEY")), BackendType::Numeric);
        assert_eq!(map_logical_type(Some("numeric")), BackendType::Numeric);
    }

    #[test]
    fn temporal_and_misc() {
        assert_eq!(map_logical_type(Some("DATETIME2")), BackendType::Timestamp);
        assert_eq!(map_logical_type(Some("timestamp")), BackendType::Timestamp);
        assert_eq!(map_logical_type(Some("date")), BackendType::Date);
        assert_eq!(map_logical_type(Some("TIME")), BackendType::Time);
        assert_eq!(map_logical_type(Some("bit")), BackendType::Boolean);
        assert_eq!(map_logical_type(Some("BOOLEAN")), BackendType::Boolean);
        assert_eq!(map_logical_type(Some("uuid")), BackendType::Uuid);
        assert_eq!(map_logical_type(Some("JSONB")), BackendType::Json);
    }

    #[test]
    fn fallback_is_text() {
        assert_eq!(map_logical_type(None), BackendType::Text);
        assert_eq!(map_logical_type(Some("")), BackendType::Text);
        assert_eq!(map_logical_type(Some("   ")), BackendType::Text);
        assert_eq!(map_logical_type(Some("GEOGRAPHY")), BackendType::Text);
    }

    #[test]
    fn rendering_maps_back_to_same_category() {
        for ty in [
            BackendType::Text,
            BackendType::Integer,
            BackendType::Double,
            BackendType::Numeric,
            BackendType::Timestamp,
            BackendType::Date,
            BackendType::Time,
            BackendType::Boolean,
            BackendType::Uuid,
            BackendType::Json,
        ] {
            assert_eq!(map_logical_type(Some(ty.sql())), ty, "{ty}");
        }
    }
}
