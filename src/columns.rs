use std::collections::HashMap;

use crate::config::ColumnsConfig;
use crate::error::{AppError, Result};

/// Semantic role a header column plays in a ticket export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    Group,
    Unit,
    Ticket,
    ResolutionTime,
    Category,
    Priority,
    Status,
    Created,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 8] = [
        ColumnRole::Group,
        ColumnRole::Unit,
        ColumnRole::Ticket,
        ColumnRole::ResolutionTime,
        ColumnRole::Category,
        ColumnRole::Priority,
        ColumnRole::Status,
        ColumnRole::Created,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ColumnRole::Group => "group",
            ColumnRole::Unit => "unit",
            ColumnRole::Ticket => "ticket",
            ColumnRole::ResolutionTime => "resolution_time",
            ColumnRole::Category => "category",
            ColumnRole::Priority => "priority",
            ColumnRole::Status => "status",
            ColumnRole::Created => "created",
        }
    }

    /// Lowercase fragments that identify the role in a header name.
    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            ColumnRole::Group => &["групп", "group"],
            ColumnRole::Unit => &["аудитор", "classroom", "room", "unit"],
            ColumnRole::Ticket => &["issue key", "ticket", "key"],
            ColumnRole::ResolutionTime => &["время", "часы", "resolution", "hours"],
            ColumnRole::Category => &["категор", "проблем", "category"],
            ColumnRole::Priority => &["priority", "приоритет"],
            ColumnRole::Status => &["status", "статус"],
            ColumnRole::Created => &["created", "дата", "date"],
        }
    }

    /// Aggregation is impossible without these.
    pub fn is_required(self) -> bool {
        matches!(self, ColumnRole::Group | ColumnRole::Unit)
    }

    fn configured(self, columns: &ColumnsConfig) -> Option<&str> {
        let value = match self {
            ColumnRole::Group => &columns.group,
            ColumnRole::Unit => &columns.unit,
            ColumnRole::Ticket => &columns.ticket,
            ColumnRole::ResolutionTime => &columns.resolution_time,
            ColumnRole::Category => &columns.category,
            ColumnRole::Priority => &columns.priority,
            ColumnRole::Status => &columns.status,
            ColumnRole::Created => &columns.created,
        };
        value.as_deref()
    }
}

/// Maps column roles to their index in a CSV record.
#[derive(Debug)]
pub struct ColumnMap {
    indices: HashMap<ColumnRole, usize>,
    headers: Vec<String>,
    missing_optional: Vec<String>,
}

impl ColumnMap {
    /// Resolve every role against the header record.
    ///
    /// Explicitly configured names are matched exactly (after trimming) and
    /// must exist. Unconfigured roles take the first header, not already
    /// claimed by another role, containing one of the role's synonyms.
    pub fn resolve(headers: &csv::StringRecord, columns: &ColumnsConfig) -> Result<Self> {
        let header_list: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
        let lowered: Vec<String> = header_list.iter().map(|h| h.to_lowercase()).collect();
        let mut indices = HashMap::new();

        for role in ColumnRole::ALL {
            if let Some(column) = role.configured(columns) {
                let index = header_list
                    .iter()
                    .position(|h| h == column.trim())
                    .ok_or_else(|| AppError::ConfiguredColumnMissing {
                        role: role.name().to_string(),
                        column: column.to_string(),
                    })?;
                indices.insert(role, index);
            }
        }

        for role in ColumnRole::ALL {
            if indices.contains_key(&role) {
                continue;
            }
            let found = lowered.iter().enumerate().find(|(i, header)| {
                !indices.values().any(|claimed| claimed == i)
                    && role.synonyms().iter().any(|s| header.contains(s))
            });
            if let Some((index, _)) = found {
                indices.insert(role, index);
            }
        }

        let missing_required: Vec<String> = ColumnRole::ALL
            .iter()
            .filter(|role| role.is_required() && !indices.contains_key(role))
            .map(|role| role.name().to_string())
            .collect();
        if !missing_required.is_empty() {
            return Err(AppError::MissingColumns(missing_required));
        }

        let missing_optional = ColumnRole::ALL
            .iter()
            .filter(|role| !indices.contains_key(role))
            .map(|role| role.name().to_string())
            .collect();

        Ok(ColumnMap {
            indices,
            headers: header_list,
            missing_optional,
        })
    }

    /// Trimmed value of a role's column; empty cells read as `None`.
    pub fn get<'a>(&self, record: &'a csv::StringRecord, role: ColumnRole) -> Option<&'a str> {
        self.indices
            .get(&role)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Header name bound to a role.
    pub fn header(&self, role: ColumnRole) -> Option<&str> {
        self.indices.get(&role).map(|&i| self.headers[i].as_str())
    }

    pub fn missing_optional(&self) -> &[String] {
        &self.missing_optional
    }
}

/// Pick `;` when the header line has more unquoted semicolons than commas.
pub fn sniff_delimiter(header_line: &str) -> u8 {
    let mut commas = 0usize;
    let mut semicolons = 0usize;
    let mut quoted = false;
    for c in header_line.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => commas += 1,
            ';' if !quoted => semicolons += 1,
            _ => {}
        }
    }
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_headers(cols: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(cols.to_vec())
    }

    #[test]
    fn sniffs_russian_jira_headers() {
        let headers = make_headers(&[
            "Issue Key",
            "Аудитория",
            "Группа A/B теста",
            "Категория проблемы",
            "Priority",
            "Status",
            "Created",
            "Время решения (часы)",
        ]);
        let map = ColumnMap::resolve(&headers, &ColumnsConfig::default()).unwrap();
        assert_eq!(map.header(ColumnRole::Group), Some("Группа A/B теста"));
        assert_eq!(map.header(ColumnRole::Unit), Some("Аудитория"));
        assert_eq!(map.header(ColumnRole::Ticket), Some("Issue Key"));
        assert_eq!(map.header(ColumnRole::ResolutionTime), Some("Время решения (часы)"));
        assert_eq!(map.header(ColumnRole::Category), Some("Категория проблемы"));
        assert_eq!(map.header(ColumnRole::Created), Some("Created"));
        assert!(map.missing_optional().is_empty());
    }

    #[test]
    fn explicit_mapping_wins_over_sniffing() {
        let headers = make_headers(&["Group label", "Bucket", "Lab"]);
        let columns = ColumnsConfig {
            group: Some("Bucket".into()),
            unit: Some("Lab".into()),
            ..Default::default()
        };
        let map = ColumnMap::resolve(&headers, &columns).unwrap();
        assert_eq!(map.header(ColumnRole::Group), Some("Bucket"));
        assert_eq!(map.header(ColumnRole::Unit), Some("Lab"));
    }

    #[test]
    fn configured_column_must_exist() {
        let headers = make_headers(&["Group", "Room"]);
        let columns = ColumnsConfig {
            category: Some("Kind".into()),
            ..Default::default()
        };
        match ColumnMap::resolve(&headers, &columns) {
            Err(AppError::ConfiguredColumnMissing { role, column }) => {
                assert_eq!(role, "category");
                assert_eq!(column, "Kind");
            }
            other => panic!("expected ConfiguredColumnMissing, got {other:?}"),
        }
    }

    #[test]
    fn missing_required_roles_are_listed() {
        let headers = make_headers(&["Status", "Priority"]);
        match ColumnMap::resolve(&headers, &ColumnsConfig::default()) {
            Err(AppError::MissingColumns(cols)) => {
                assert_eq!(cols, vec!["group".to_string(), "unit".to_string()]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn missing_optional_roles_are_reported() {
        let headers = make_headers(&["Group", "Classroom"]);
        let map = ColumnMap::resolve(&headers, &ColumnsConfig::default()).unwrap();
        assert!(map.header(ColumnRole::Group).is_some());
        assert!(map.header(ColumnRole::Category).is_none());
        assert!(map.missing_optional().contains(&"category".to_string()));
        assert!(map.missing_optional().contains(&"created".to_string()));
    }

    #[test]
    fn get_trims_and_drops_empty_cells() {
        let headers = make_headers(&["Group", "Room"]);
        let map = ColumnMap::resolve(&headers, &ColumnsConfig::default()).unwrap();
        let record = csv::StringRecord::from(vec![" A ", "  "]);
        assert_eq!(map.get(&record, ColumnRole::Group), Some("A"));
        assert_eq!(map.get(&record, ColumnRole::Unit), None);
        assert_eq!(map.get(&record, ColumnRole::Status), None);
    }

    #[test]
    fn delimiter_sniffing() {
        assert_eq!(sniff_delimiter("a,b,c"), b',');
        assert_eq!(sniff_delimiter("a;b;c"), b';');
        assert_eq!(sniff_delimiter("\"x, y\";b;c"), b';');
        assert_eq!(sniff_delimiter("single"), b',');
    }
}
