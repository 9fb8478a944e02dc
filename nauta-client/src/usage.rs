//! Paginated usage listings of the user portal

use crate::error::NautaError;
use crate::layout;
use crate::model::{
    ConnectionRecord, ConnectionSummary, RechargeRecord, RechargeSummary, TransferRecord, TransferSummary,
    UsageHistory, UsagePeriod,
};
use crate::scrape;
use crate::transport::Transport;
use scraper::Html;
use std::collections::BTreeMap;

/// Path segment of the authenticated user area
pub(crate) const USER_AREA: &str = "useraaa";

/// `list_type` sent with every summary request
const SUMMARY_LIST_TYPE: &str = "service_detail";

/// One kind of usage listing and how to read its cells
pub(crate) trait UsageTable {
    type Summary;
    type Row;

    /// Describes the listing in transport errors
    const CONTEXT: &'static str;
    /// Landing page with the period selector
    const LANDING: &'static str;
    /// Endpoint answering with the summary counters
    const SUMMARY: &'static str;
    /// Endpoint serving listing pages
    const LIST: &'static str;
    /// Cells per listing row
    const STRIDE: usize;

    fn summary(cells: &[String]) -> Result<Self::Summary, NautaError>;
    fn item_count(summary: &Self::Summary) -> u32;
    /// Build a row from exactly [`Self::STRIDE`] cells
    fn row(cells: &[String]) -> Option<Self::Row>;
}

fn parse_count(cell: &str, what: &str) -> Result<u32, NautaError> {
    cell.trim()
        .parse()
        .map_err(|_| NautaError::Parse(format!("{} count \"{}\" is not a number", what, cell)))
}

fn missing_summary(what: &str, cells: &[String]) -> NautaError {
    NautaError::Parse(format!("{} summary has only {} counters", what, cells.len()))
}

pub(crate) struct Connections;

impl UsageTable for Connections {
    type Summary = ConnectionSummary;
    type Row = ConnectionRecord;

    const CONTEXT: &'static str = "Get connection details";
    const LANDING: &'static str = "service_detail";
    const SUMMARY: &'static str = "service_detail_summary";
    const LIST: &'static str = "service_detail_list";
    const STRIDE: usize = layout::CONNECTION_ROW_STRIDE;

    fn summary(cells: &[String]) -> Result<Self::Summary, NautaError> {
        match cells {
            [connections, total_time, total_import, upload, download, total_traffic, ..] => Ok(ConnectionSummary {
                connections: parse_count(connections, "connection")?,
                total_time: total_time.clone(),
                total_import: total_import.clone(),
                upload_traffic: upload.clone(),
                download_traffic: download.clone(),
                total_traffic: total_traffic.clone(),
            }),
            _ => Err(missing_summary("connection", cells)),
        }
    }

    fn item_count(summary: &Self::Summary) -> u32 {
        summary.connections
    }

    fn row(cells: &[String]) -> Option<Self::Row> {
        match cells {
            [start, end, duration, upload, download, import] => Some(ConnectionRecord {
                start_datetime: start.clone(),
                end_datetime: end.clone(),
                duration: duration.clone(),
                upload_traffic: upload.clone(),
                download_traffic: download.clone(),
                import: import.clone(),
            }),
            _ => None,
        }
    }
}

pub(crate) struct Recharges;

impl UsageTable for Recharges {
    type Summary = RechargeSummary;
    type Row = RechargeRecord;

    const CONTEXT: &'static str = "Get recharge details";
    const LANDING: &'static str = "recharge_detail";
    const SUMMARY: &'static str = "recharge_detail_summary";
    const LIST: &'static str = "recharge_detail_list";
    const STRIDE: usize = layout::RECHARGE_ROW_STRIDE;

    fn summary(cells: &[String]) -> Result<Self::Summary, NautaError> {
        match cells {
            [recharges, total_import, ..] => Ok(RechargeSummary {
                recharges: parse_count(recharges, "recharge")?,
                total_import: total_import.clone(),
            }),
            _ => Err(missing_summary("recharge", cells)),
        }
    }

    fn item_count(summary: &Self::Summary) -> u32 {
        summary.recharges
    }

    fn row(cells: &[String]) -> Option<Self::Row> {
        match cells {
            [datetime, import, channel, kind] => Some(RechargeRecord {
                datetime: datetime.clone(),
                import: import.clone(),
                channel: channel.clone(),
                kind: kind.clone(),
            }),
            _ => None,
        }
    }
}

pub(crate) struct Transfers;

impl UsageTable for Transfers {
    type Summary = TransferSummary;
    type Row = TransferRecord;

    const CONTEXT: &'static str = "Get transfer details";
    const LANDING: &'static str = "transfer_detail";
    const SUMMARY: &'static str = "transfer_detail_summary";
    const LIST: &'static str = "transfer_detail_list";
    const STRIDE: usize = layout::TRANSFER_ROW_STRIDE;

    fn summary(cells: &[String]) -> Result<Self::Summary, NautaError> {
        match cells {
            [transfers, total_import, ..] => Ok(TransferSummary {
                transfers: parse_count(transfers, "transfer")?,
                total_import: total_import.clone(),
            }),
            _ => Err(missing_summary("transfer", cells)),
        }
    }

    fn item_count(summary: &Self::Summary) -> u32 {
        summary.transfers
    }

    fn row(cells: &[String]) -> Option<Self::Row> {
        match cells {
            [datetime, import, target_account] => Some(TransferRecord {
                datetime: datetime.clone(),
                import: import.clone(),
                target_account: target_account.clone(),
            }),
            _ => None,
        }
    }
}

/// Fetch every period of a usage listing
///
/// Any failure aborts the whole walk; nothing collected so far is returned.
pub(crate) fn fetch_history<T: UsageTable>(
    transport: &Transport,
    csrf: &str,
) -> Result<UsageHistory<T::Summary, T::Row>, NautaError> {
    let landing = transport.get(&[USER_AREA, T::LANDING], T::CONTEXT)?;
    let periods = scrape::attributes(
        &Html::parse_document(&landing.body),
        layout::PERIOD_OPTIONS,
        "value",
    )?;

    let mut history = BTreeMap::new();
    for period in periods {
        let form = [
            ("csrf", csrf),
            ("year_month", period.as_str()),
            ("list_type", SUMMARY_LIST_TYPE),
        ];
        let page = transport.post_form(&[USER_AREA, T::SUMMARY], &form, T::CONTEXT)?;
        let cells = scrape::texts(&Html::parse_document(&page.body), layout::SUMMARY_CELLS)?;
        let summary = T::summary(&cells)?;

        let count = T::item_count(&summary);
        let rows = fetch_rows::<T>(transport, &period, count)?;
        tracing::debug!(period = %period, count, rows = rows.len(), "Fetched {}", T::LIST);

        history.insert(period, UsagePeriod { summary, rows });
    }

    Ok(history)
}

fn fetch_rows<T: UsageTable>(transport: &Transport, period: &str, count: u32) -> Result<Vec<T::Row>, NautaError> {
    let count_segment = count.to_string();
    // Capacity follows the rows received, not the advertised count
    let mut rows = Vec::new();

    for page_number in 1..=layout::page_count(count) {
        let page_segment = page_number.to_string();
        let page = transport.get(
            &[USER_AREA, T::LIST, period, count_segment.as_str(), page_segment.as_str()],
            T::CONTEXT,
        )?;
        let cells = scrape::texts(&Html::parse_document(&page.body), layout::LIST_CELLS)?;
        for cells in scrape::rows(&cells, T::STRIDE, T::LIST)? {
            let row = T::row(cells).ok_or_else(|| NautaError::Parse(format!("malformed {} row", T::LIST)))?;
            rows.push(row);
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_connection_summary_by_position() {
        let summary = Connections::summary(&cells(&["16", "10:00:00", "$5.00", "1 GB", "3 GB", "4 GB"])).unwrap();
        assert_eq!(summary.connections, 16);
        assert_eq!(summary.total_traffic, "4 GB");
        assert_eq!(Connections::item_count(&summary), 16);
    }

    #[test]
    fn test_short_summary_is_parse_error() {
        assert!(matches!(
            Connections::summary(&cells(&["16", "10:00:00"])),
            Err(NautaError::Parse(_))
        ));
        assert!(matches!(Transfers::summary(&cells(&[])), Err(NautaError::Parse(_))));
    }

    #[test]
    fn test_non_numeric_count_is_parse_error() {
        assert!(matches!(
            Recharges::summary(&cells(&["muchos", "$10.00"])),
            Err(NautaError::Parse(_))
        ));
    }

    #[test]
    fn test_rows_match_stride() {
        assert!(Recharges::row(&cells(&["2024-01-01", "$10.00", "Web", "Recarga"])).is_some());
        assert!(Recharges::row(&cells(&["2024-01-01", "$10.00", "Web"])).is_none());
        let transfer = Transfers::row(&cells(&["2024-01-01", "$1.00", "friend@nauta.com.cu"])).unwrap();
        assert_eq!(transfer.target_account, "friend@nauta.com.cu");
    }
}
