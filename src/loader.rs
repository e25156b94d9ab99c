use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::columns::{sniff_delimiter, ColumnMap, ColumnRole};
use crate::config::{Config, DailyConfig};
use crate::error::{AppError, Result};
use crate::models::{
    CategoryShift, ClassroomAggregate, DailyCount, Group, ParseWarning, TicketRecord,
};

const DAILY_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];
const DAILY_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%d.%m.%Y %H:%M"];

/// Parsed ticket export plus import metadata.
#[derive(Debug)]
pub struct TicketExport {
    pub tickets: Vec<TicketRecord>,
    pub warnings: Vec<ParseWarning>,
    pub total_rows: usize,
    pub delimiter: char,
    pub detected_columns: Vec<(ColumnRole, String)>,
    pub missing_optional_columns: Vec<String>,
}

/// Classroom aggregates reduced to the two samples and the category table.
#[derive(Debug)]
pub struct PreparedData {
    pub classrooms: Vec<ClassroomAggregate>,
    pub sample_a: Vec<f64>,
    pub sample_b: Vec<f64>,
    pub categories: Vec<CategoryShift>,
    pub skipped_rows: usize,
}

/// Read a delimited text file as UTF-8, dropping a leading byte-order mark.
pub fn read_source(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(AppError::MissingInput(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    Ok(content.trim_start_matches('\u{feff}').to_string())
}

pub fn load_tickets(path: &Path, config: &Config) -> Result<TicketExport> {
    let content = read_source(path)?;
    info!(path = %path.display(), bytes = content.len(), "loading ticket export");
    parse_tickets(&content, config)
}

/// Core parsing logic over an in-memory export.
pub fn parse_tickets(content: &str, config: &Config) -> Result<TicketExport> {
    let header_line = content.lines().next().unwrap_or("");
    if header_line.trim().is_empty() {
        return Err(AppError::EmptyFile);
    }
    let delimiter = sniff_delimiter(header_line);

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(content.as_bytes());

    let headers = rdr.headers()?.clone();
    let col_map = ColumnMap::resolve(&headers, &config.columns)?;
    let detected_columns: Vec<(ColumnRole, String)> = ColumnRole::ALL
        .iter()
        .filter_map(|&role| col_map.header(role).map(|h| (role, h.to_string())))
        .collect();
    for (role, header) in &detected_columns {
        debug!(role = role.name(), column = %header, "column resolved");
    }

    let mut tickets = Vec::new();
    let mut warnings = Vec::new();
    let mut bad_dates = 0usize;
    let mut bad_times = 0usize;
    let mut row_idx = 0usize;
    let mut seen_keys = HashSet::new();

    for result in rdr.records() {
        row_idx += 1;
        let line = row_idx + 1; // header is line 1
        match result {
            Ok(record) => {
                let ticket = record_to_ticket(&col_map, &record, line, config);
                if let (None, Some(raw)) = (ticket.created_at, col_map.get(&record, ColumnRole::Created)) {
                    bad_dates += 1;
                    warnings.push(ParseWarning {
                        line: ticket.line,
                        message: format!("unparseable creation date {raw:?}"),
                    });
                }
                if let (None, Some(raw)) = (
                    ticket.resolution_hours,
                    col_map.get(&record, ColumnRole::ResolutionTime),
                ) {
                    bad_times += 1;
                    warnings.push(ParseWarning {
                        line: ticket.line,
                        message: format!("unparseable resolution time {raw:?}"),
                    });
                }
                if let Some(key) = &ticket.ticket_id {
                    if !seen_keys.insert(key.clone()) {
                        warnings.push(ParseWarning {
                            line,
                            message: format!("duplicate ticket key {key}"),
                        });
                    }
                }
                tickets.push(ticket);
            }
            Err(err) => warnings.push(ParseWarning {
                line,
                message: err.to_string(),
            }),
        }
    }

    if row_idx == 0 {
        return Err(AppError::EmptyFile);
    }
    if bad_dates > 0 {
        warn!(count = bad_dates, "creation dates could not be parsed and were left empty");
    }
    if bad_times > 0 {
        warn!(count = bad_times, "resolution times could not be parsed and were left empty");
    }

    Ok(TicketExport {
        tickets,
        warnings,
        total_rows: row_idx,
        delimiter: delimiter as char,
        detected_columns,
        missing_optional_columns: col_map.missing_optional().to_vec(),
    })
}

fn record_to_ticket(
    col_map: &ColumnMap,
    record: &csv::StringRecord,
    line: usize,
    config: &Config,
) -> TicketRecord {
    let priority = col_map.get(record, ColumnRole::Priority);
    let status = col_map.get(record, ColumnRole::Status);

    TicketRecord {
        line,
        group: col_map
            .get(record, ColumnRole::Group)
            .and_then(|raw| parse_group(raw, config)),
        unit: col_map.get(record, ColumnRole::Unit).map(str::to_string),
        ticket_id: col_map.get(record, ColumnRole::Ticket).map(str::to_string),
        category: col_map.get(record, ColumnRole::Category).map(str::to_string),
        created_at: col_map
            .get(record, ColumnRole::Created)
            .and_then(|raw| parse_created(raw, &config.values.created_format)),
        resolution_hours: col_map
            .get(record, ColumnRole::ResolutionTime)
            .and_then(parse_decimal),
        is_critical: priority
            .is_some_and(|p| config.values.critical_priorities.iter().any(|c| c == p)),
        is_resolved: status
            .is_some_and(|s| config.values.resolved_statuses.iter().any(|r| r == s)),
    }
}

pub fn parse_group(raw: &str, config: &Config) -> Option<Group> {
    let raw = raw.trim();
    if raw == config.groups.a_label {
        Some(Group::A)
    } else if raw == config.groups.b_label {
        Some(Group::B)
    } else {
        None
    }
}

/// "12,5" → 12.5, "" → None, "n/a" → None
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse with the configured format; a date-only format yields midnight.
pub fn parse_created(raw: &str, format: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, format).ok().or_else(|| {
        NaiveDate::parse_from_str(raw, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

/// Aggregate tickets per (unit, group); rows without a unit or a known group are skipped.
pub fn aggregate_classrooms(tickets: &[TicketRecord]) -> (Vec<ClassroomAggregate>, usize) {
    #[derive(Default)]
    struct Acc {
        count: usize,
        time_sum: f64,
        time_count: usize,
        critical: usize,
        resolved: usize,
    }

    let mut map: BTreeMap<(String, Group), Acc> = BTreeMap::new();
    let mut skipped = 0usize;

    for ticket in tickets {
        let (Some(unit), Some(group)) = (ticket.unit.as_ref(), ticket.group) else {
            skipped += 1;
            continue;
        };
        let acc = map.entry((unit.clone(), group)).or_default();
        acc.count += 1;
        if let Some(hours) = ticket.resolution_hours {
            acc.time_sum += hours;
            acc.time_count += 1;
        }
        if ticket.is_critical {
            acc.critical += 1;
        }
        if ticket.is_resolved {
            acc.resolved += 1;
        }
    }

    let classrooms = map
        .into_iter()
        .map(|((unit, group), acc)| ClassroomAggregate {
            unit,
            group,
            ticket_count: acc.count,
            avg_resolution_time: (acc.time_count > 0).then(|| acc.time_sum / acc.time_count as f64),
            critical_tickets: acc.critical,
            resolution_rate: acc.resolved as f64 / acc.count as f64,
        })
        .collect();

    (classrooms, skipped)
}

/// Per-classroom ticket counts for group A and group B, in unit order.
pub fn samples(classrooms: &[ClassroomAggregate]) -> (Vec<f64>, Vec<f64>) {
    let pick = |group: Group| -> Vec<f64> {
        classrooms
            .iter()
            .filter(|c| c.group == group)
            .map(|c| c.ticket_count as f64)
            .collect()
    };
    (pick(Group::A), pick(Group::B))
}

/// `(count_b - count_a) / count_a * 100`, rounded to one decimal.
pub fn change_percent(count_a: usize, count_b: usize) -> Option<f64> {
    if count_a == 0 {
        return None;
    }
    let pct = (count_b as f64 - count_a as f64) / count_a as f64 * 100.0;
    Some((pct * 10.0).round() / 10.0)
}

/// Category × group contingency table with the B − A shift.
pub fn category_shifts(tickets: &[TicketRecord]) -> Vec<CategoryShift> {
    let mut map: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for ticket in tickets {
        let (Some(category), Some(group)) = (ticket.category.as_deref(), ticket.group) else {
            continue;
        };
        let entry = map.entry(category).or_insert((0, 0));
        match group {
            Group::A => entry.0 += 1,
            Group::B => entry.1 += 1,
        }
    }

    map.into_iter()
        .map(|(category, (count_a, count_b))| CategoryShift {
            category: category.to_string(),
            count_a,
            count_b,
            change: count_b as i64 - count_a as i64,
            change_percent: change_percent(count_a, count_b),
        })
        .collect()
}

/// Reduce an export into the analyzer's inputs. Fails when a group ends up empty.
pub fn prepare(export: &TicketExport) -> Result<PreparedData> {
    let (classrooms, skipped_rows) = aggregate_classrooms(&export.tickets);
    if skipped_rows > 0 {
        warn!(
            rows = skipped_rows,
            "rows without a classroom or a known group label were skipped"
        );
    }

    let (sample_a, sample_b) = samples(&classrooms);
    if sample_a.is_empty() {
        return Err(AppError::EmptyGroup(Group::A.label().to_string()));
    }
    if sample_b.is_empty() {
        return Err(AppError::EmptyGroup(Group::B.label().to_string()));
    }

    let categories = category_shifts(&export.tickets);
    info!(
        classrooms_a = sample_a.len(),
        classrooms_b = sample_b.len(),
        categories = categories.len(),
        "prepared samples"
    );

    Ok(PreparedData {
        classrooms,
        sample_a,
        sample_b,
        categories,
        skipped_rows,
    })
}

/// Load the optional daily counts file. Any problem is reported and yields `None`.
pub fn load_daily(path: &Path, daily: &DailyConfig) -> Option<Vec<DailyCount>> {
    let content = match read_source(path) {
        Ok(content) => content,
        Err(AppError::MissingInput(_)) => {
            warn!(path = %path.display(), "daily stats file not found");
            return None;
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "daily stats file could not be read");
            return None;
        }
    };
    match parse_daily(&content, daily) {
        Ok(days) if !days.is_empty() => {
            info!(days = days.len(), "loaded daily stats");
            Some(days)
        }
        Ok(_) => {
            warn!("daily stats file has no usable rows");
            None
        }
        Err(err) => {
            warn!(error = %err, "daily stats could not be parsed");
            None
        }
    }
}

pub fn parse_daily(content: &str, daily: &DailyConfig) -> Result<Vec<DailyCount>> {
    let header_line = content.lines().next().unwrap_or("");
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(header_line))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = rdr.headers()?.clone();
    let find = |name: &str| headers.iter().position(|h| h == name);
    let date_idx = find(&daily.date_column)
        .or_else(|| {
            headers.iter().position(|h| {
                let h = h.to_lowercase();
                h.contains("дата") || h.contains("date")
            })
        })
        .ok_or_else(|| AppError::MissingColumns(vec![daily.date_column.clone()]))?;
    let a_idx = find(&daily.a_column);
    let b_idx = find(&daily.b_column);
    let (Some(a_idx), Some(b_idx)) = (a_idx, b_idx) else {
        let missing = [(&daily.a_column, a_idx), (&daily.b_column, b_idx)]
            .into_iter()
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| name.clone())
            .collect();
        return Err(AppError::MissingColumns(missing));
    };

    let mut days = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let parsed = (
            record.get(date_idx).and_then(parse_daily_date),
            record.get(a_idx).and_then(parse_decimal),
            record.get(b_idx).and_then(parse_decimal),
        );
        match parsed {
            (Some(date), Some(count_a), Some(count_b)) => days.push(DailyCount {
                date,
                count_a,
                count_b,
            }),
            _ => debug!(row = ?record, "skipping unparseable daily row"),
        }
    }
    days.sort_by_key(|d| d.date);
    Ok(days)
}

pub fn parse_daily_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DAILY_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DAILY_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\u{feff}Issue Key;Аудитория;Группа A/B теста;Категория проблемы;Priority;Status;Created;Время решения (часы)
MM-1;101;A;Проектор;Highest;Решена;05/02/2025 10:15;2,5
MM-2;101;A;Звук;Low;Открыта;06/02/2025 11:00;
MM-3;102;A;Проектор;Medium;Закрыта;07/02/2025 09:30;4
MM-4;201;B;Проектор;Highest;Решена;05/02/2025 12:00;1.5
MM-5;202;B;Звук;Low;Решена;bad date;n/a
MM-6;;B;Звук;Low;Решена;08/02/2025 08:00;3
MM-7;203;C;Звук;Low;Решена;08/02/2025 08:00;3
";

    fn parsed() -> TicketExport {
        parse_tickets(EXPORT.trim_start_matches('\u{feff}'), &Config::default()).unwrap()
    }

    #[test]
    fn parses_semicolon_export() {
        let export = parsed();
        assert_eq!(export.delimiter, ';');
        assert_eq!(export.total_rows, 7);
        assert_eq!(export.tickets.len(), 7);
        assert_eq!(export.warnings.len(), 2);
        assert!(export.warnings.iter().all(|w| w.line == 6));
        assert_eq!(export.warnings[0].message, "unparseable creation date \"bad date\"");
        assert!(export.missing_optional_columns.is_empty());

        let first = &export.tickets[0];
        assert_eq!(first.line, 2);
        assert_eq!(first.group, Some(Group::A));
        assert_eq!(first.unit.as_deref(), Some("101"));
        assert_eq!(first.resolution_hours, Some(2.5));
        assert!(first.is_critical);
        assert!(first.is_resolved);
        assert_eq!(
            first.created_at.map(|d| d.format("%Y-%m-%dT%H:%M").to_string()),
            Some("2025-02-05T10:15".to_string())
        );
    }

    #[test]
    fn malformed_fields_degrade_to_missing() {
        let export = parsed();
        let fifth = &export.tickets[4];
        assert!(fifth.created_at.is_none());
        assert!(fifth.resolution_hours.is_none());
        assert_eq!(export.tickets[1].resolution_hours, None);
        assert_eq!(export.tickets[6].group, None);
    }

    #[test]
    fn aggregates_per_classroom_and_group() {
        let (classrooms, skipped) = aggregate_classrooms(&parsed().tickets);
        assert_eq!(skipped, 2);
        assert_eq!(classrooms.len(), 4);

        let room_101 = &classrooms[0];
        assert_eq!(room_101.unit, "101");
        assert_eq!(room_101.group, Group::A);
        assert_eq!(room_101.ticket_count, 2);
        assert_eq!(room_101.avg_resolution_time, Some(2.5));
        assert_eq!(room_101.critical_tickets, 1);
        assert!((room_101.resolution_rate - 0.5).abs() < 1e-12);

        let room_202 = classrooms.iter().find(|c| c.unit == "202").unwrap();
        assert_eq!(room_202.avg_resolution_time, None);
    }

    #[test]
    fn prepares_samples_and_categories() {
        let prepared = prepare(&parsed()).unwrap();
        assert_eq!(prepared.sample_a, vec![2.0, 1.0]);
        assert_eq!(prepared.sample_b, vec![1.0, 1.0]);
        assert_eq!(prepared.skipped_rows, 2);

        let projector = prepared
            .categories
            .iter()
            .find(|c| c.category == "Проектор")
            .unwrap();
        assert_eq!((projector.count_a, projector.count_b), (2, 1));
        assert_eq!(projector.change, -1);
        assert_eq!(projector.change_percent, Some(-50.0));
    }

    #[test]
    fn change_percent_matches_hand_computation() {
        assert_eq!(change_percent(10, 7), Some(-30.0));
        assert_eq!(change_percent(3, 4), Some(33.3));
        assert_eq!(change_percent(0, 5), None);
    }

    #[test]
    fn empty_group_aborts_preparation() {
        let content = "Group,Room\nA,1\nA,2\n";
        let export = parse_tickets(content, &Config::default()).unwrap();
        match prepare(&export) {
            Err(AppError::EmptyGroup(label)) => assert_eq!(label, "B"),
            other => panic!("expected EmptyGroup, got {other:?}"),
        }
    }

    #[test]
    fn header_only_file_is_empty() {
        let err = parse_tickets("Group,Room\n", &Config::default()).unwrap_err();
        assert!(matches!(err, AppError::EmptyFile));
        let err = parse_tickets("", &Config::default()).unwrap_err();
        assert!(matches!(err, AppError::EmptyFile));
    }

    #[test]
    fn custom_group_labels() {
        let mut config = Config::default();
        config.groups.a_label = "control".into();
        config.groups.b_label = "treatment".into();
        assert_eq!(parse_group(" control ", &config), Some(Group::A));
        assert_eq!(parse_group("treatment", &config), Some(Group::B));
        assert_eq!(parse_group("A", &config), None);
    }

    #[test]
    fn decimal_and_date_parsing() {
        assert_eq!(parse_decimal("12,5"), Some(12.5));
        assert_eq!(parse_decimal("  "), None);
        assert_eq!(parse_decimal("NaN"), None);
        assert!(parse_created("31/12/2024 23:59", "%d/%m/%Y %H:%M").is_some());
        assert!(parse_created("2024-12-31", "%Y-%m-%d").is_some());
        assert!(parse_created("12/31/2024 23:59", "%d/%m/%Y %H:%M").is_none());
    }

    #[test]
    fn read_source_strips_bom_and_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        std::fs::write(&path, EXPORT).unwrap();
        let content = read_source(&path).unwrap();
        assert!(content.starts_with("Issue Key"));

        let missing = dir.path().join("absent.csv");
        assert!(matches!(read_source(&missing), Err(AppError::MissingInput(_))));
    }

    #[test]
    fn duplicate_ticket_keys_are_warned_and_kept() {
        let content = "Key,Group,Room\nT-1,A,1\nT-2,B,2\nT-1,A,1\n";
        let export = parse_tickets(content, &Config::default()).unwrap();
        assert_eq!(export.tickets.len(), 3);
        assert_eq!(
            export.warnings,
            vec![ParseWarning {
                line: 4,
                message: "duplicate ticket key T-1".into(),
            }]
        );
    }

    #[test]
    fn parses_daily_stats() {
        let content = "Дата,A,B\n2025-02-02,4,3\n2025-02-01,5,2\nnot a date,1,1\n2025-02-03,x,1\n";
        let days = parse_daily(content, &DailyConfig::default()).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert_eq!(days[0].count_a, 5.0);
        assert_eq!(days[1].count_b, 3.0);
    }

    #[test]
    fn daily_stats_fall_back_to_a_date_like_column() {
        let content = "Report date;A;B\n01.03.2025;1;2\n";
        let days = parse_daily(content, &DailyConfig::default()).unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
    }

    #[test]
    fn daily_stats_missing_count_column() {
        let err = parse_daily("Дата,A\n2025-02-01,1\n", &DailyConfig::default()).unwrap_err();
        match err {
            AppError::MissingColumns(cols) => assert_eq!(cols, vec!["B".to_string()]),
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn missing_daily_file_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_daily(&dir.path().join("none.csv"), &DailyConfig::default()).is_none());
    }
}
