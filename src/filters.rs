//! Query filters and their encoding into the portal's form fields
//!
//! A [`QueryFilter`] says *what* to search for. A [`FilterEncoder`] says *how* the
//! portal's ASP.NET forms expect it: the issued and received query pages use different
//! date controls, so each mode has its own encoder. Field names mirror the portal DOM
//! and are expected to drift; keep them in this module only.

use chrono::{Datelike, NaiveDate};

use crate::form::HiddenFields;
use crate::types::{DownloadType, VoucherState};
use crate::window::{Clock, QueryWindow};

/// Default calendar fields used when a filter has no window (identifier searches)
const DEFAULT_YEAR: i32 = 2015;
const DEFAULT_MONTH: u32 = 1;

const SCRIPT_MANAGER: &str = "ctl00$ScriptManager1";
const SEARCH_PANEL: &str = "ctl00$MainContent$UpnlBusqueda";

/// What a single search asks the portal for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryFilter {
    /// Issuer or receiver side
    pub download_type: DownloadType,
    /// Time window; `None` for identifier searches
    pub window: Option<QueryWindow>,
    /// Restrict to a single fiscal folio (UUID)
    pub document_id: Option<String>,
    /// Active or cancelled vouchers
    pub voucher_state: VoucherState,
}

impl QueryFilter {
    /// Filter for every voucher in `window`
    pub fn for_window(
        download_type: DownloadType,
        window: QueryWindow,
        voucher_state: VoucherState,
    ) -> Self {
        Self {
            download_type,
            window: Some(window),
            document_id: None,
            voucher_state,
        }
    }

    /// Filter for a single fiscal folio, ignoring dates
    pub fn for_document(
        download_type: DownloadType,
        document_id: impl Into<String>,
        voucher_state: VoucherState,
    ) -> Self {
        Self {
            download_type,
            window: None,
            document_id: Some(document_id.into()),
            voucher_state,
        }
    }

    /// Value of the central radio button: folio search or date search
    pub fn central_filter(&self) -> &'static str {
        match self.document_id.as_deref() {
            Some(id) if !id.is_empty() => "RdoFolioFiscal",
            _ => "RdoFechas",
        }
    }

    fn document_id_value(&self) -> String {
        self.document_id.clone().unwrap_or_default()
    }

    fn day(&self) -> Option<NaiveDate> {
        self.window.map(|w| w.day())
    }

    fn clocks(&self) -> (Clock, Clock) {
        match self.window {
            Some(window) => (window.start_clock(), window.end_clock()),
            None => (
                Clock {
                    hour: 0,
                    minute: 0,
                    second: 0,
                },
                Clock {
                    hour: 23,
                    minute: 59,
                    second: 59,
                },
            ),
        }
    }

    /// The encoder matching this filter's search mode
    pub fn encoder(&self) -> &'static dyn FilterEncoder {
        encoder_for(self.download_type)
    }
}

/// Turns a [`QueryFilter`] into the field mappings posted to a query page
pub trait FilterEncoder: Send + Sync {
    /// Fields for the first async postback, which switches the page to the requested
    /// filter kind and day
    fn date_selection_fields(&self, filter: &QueryFilter) -> HiddenFields;

    /// Fields for the search submit
    fn search_fields(&self, filter: &QueryFilter) -> HiddenFields;
}

/// Encoder for the issued-invoices query page
#[derive(Clone, Copy, Debug, Default)]
pub struct IssuedFilters;

/// Encoder for the received-invoices query page
#[derive(Clone, Copy, Debug, Default)]
pub struct ReceivedFilters;

/// Pick the encoder for a search mode
pub fn encoder_for(download_type: DownloadType) -> &'static dyn FilterEncoder {
    match download_type {
        DownloadType::Issued => &IssuedFilters,
        DownloadType::Received => &ReceivedFilters,
    }
}

fn async_markers(event_target: &str, trigger: &str) -> HiddenFields {
    HiddenFields::from([
        ("__ASYNCPOST", "true"),
        ("__EVENTARGUMENT", ""),
        ("__EVENTTARGET", event_target),
        ("__LASTFOCUS", ""),
        (SCRIPT_MANAGER, &format!("{SEARCH_PANEL}|{trigger}")),
    ])
}

impl ReceivedFilters {
    fn calendar_fields(filter: &QueryFilter) -> HiddenFields {
        let (year, month, day) = match filter.day() {
            Some(day) => (day.year(), day.month(), format!("{:02}", day.day())),
            None => (DEFAULT_YEAR, DEFAULT_MONTH, "00".to_string()),
        };
        let (start, end) = filter.clocks();
        let mut fields = HiddenFields::new();
        fields.set("ctl00$MainContent$CldFecha$DdlAnio", year.to_string());
        fields.set("ctl00$MainContent$CldFecha$DdlMes", month.to_string());
        fields.set("ctl00$MainContent$CldFecha$DdlDia", day);
        fields.set("ctl00$MainContent$CldFecha$DdlHora", start.hour_str());
        fields.set("ctl00$MainContent$CldFecha$DdlMinuto", start.minute_str());
        fields.set("ctl00$MainContent$CldFecha$DdlSegundo", start.second_str());
        fields.set("ctl00$MainContent$CldFecha$DdlHoraFin", end.hour_str());
        fields.set("ctl00$MainContent$CldFecha$DdlMinutoFin", end.minute_str());
        fields.set("ctl00$MainContent$CldFecha$DdlSegundoFin", end.second_str());
        fields
    }
}

impl FilterEncoder for ReceivedFilters {
    fn date_selection_fields(&self, filter: &QueryFilter) -> HiddenFields {
        let mut fields = async_markers(
            "ctl00$MainContent$RdoFechas",
            "ctl00$MainContent$RdoFechas",
        )
        .merged(Self::calendar_fields(filter));
        fields.set("ctl00$MainContent$FiltroCentral", filter.central_filter());
        fields.set("ctl00$MainContent$TxtUUID", filter.document_id_value());
        fields.set("ctl00$MainContent$DdlEstadoComprobante", "-1");
        fields.set("ctl00$MainContent$hfInicialBool", "true");
        fields
    }

    fn search_fields(&self, filter: &QueryFilter) -> HiddenFields {
        let mut fields = async_markers("", "ctl00$MainContent$BtnBusqueda")
            .merged(Self::calendar_fields(filter));
        fields.set("ctl00$MainContent$BtnBusqueda", "Buscar CFDI");
        fields.set(
            "ctl00$MainContent$DdlEstadoComprobante",
            filter.voucher_state.form_value(),
        );
        fields.set("ctl00$MainContent$FiltroCentral", filter.central_filter());
        fields.set("ctl00$MainContent$TxtRfcReceptor", "");
        fields.set("ctl00$MainContent$TxtUUID", filter.document_id_value());
        fields.set("ctl00$MainContent$ddlComplementos", "-1");
        fields.set("ctl00$MainContent$hfInicialBool", "false");
        fields
    }
}

impl IssuedFilters {
    fn range_fields(filter: &QueryFilter) -> HiddenFields {
        let date = match filter.day() {
            Some(day) => day.format("%d/%m/%Y").to_string(),
            None => format!("01/{DEFAULT_MONTH:02}/{DEFAULT_YEAR}"),
        };
        let (start, end) = filter.clocks();
        let mut fields = HiddenFields::new();
        fields.set("ctl00$MainContent$CldFechaInicial2$Calendario_text", date.as_str());
        fields.set("ctl00$MainContent$CldFechaInicial2$DdlHora", start.hour_str());
        fields.set("ctl00$MainContent$CldFechaInicial2$DdlMinuto", start.minute_str());
        fields.set("ctl00$MainContent$CldFechaInicial2$DdlSegundo", start.second_str());
        fields.set("ctl00$MainContent$CldFechaFinal2$Calendario_text", date.as_str());
        fields.set("ctl00$MainContent$CldFechaFinal2$DdlHora", end.hour_str());
        fields.set("ctl00$MainContent$CldFechaFinal2$DdlMinuto", end.minute_str());
        fields.set("ctl00$MainContent$CldFechaFinal2$DdlSegundo", end.second_str());
        fields.set("ctl00$MainContent$hfInicial", date.as_str());
        fields.set("ctl00$MainContent$hfFinal", date);
        fields
    }
}

impl FilterEncoder for IssuedFilters {
    fn date_selection_fields(&self, filter: &QueryFilter) -> HiddenFields {
        let mut fields = async_markers(
            "ctl00$MainContent$RdoFechas",
            "ctl00$MainContent$RdoFechas",
        )
        .merged(Self::range_fields(filter));
        fields.set("ctl00$MainContent$FiltroCentral", filter.central_filter());
        fields.set("ctl00$MainContent$TxtUUID", filter.document_id_value());
        fields.set("ctl00$MainContent$DdlEstadoComprobante", "-1");
        fields
    }

    fn search_fields(&self, filter: &QueryFilter) -> HiddenFields {
        let mut fields = async_markers("", "ctl00$MainContent$BtnBusqueda")
            .merged(Self::range_fields(filter));
        fields.set("ctl00$MainContent$BtnBusqueda", "Buscar CFDI");
        fields.set(
            "ctl00$MainContent$DdlEstadoComprobante",
            filter.voucher_state.form_value(),
        );
        fields.set("ctl00$MainContent$FiltroCentral", filter.central_filter());
        fields.set("ctl00$MainContent$TxtRfcReceptor", "");
        fields.set("ctl00$MainContent$TxtUUID", filter.document_id_value());
        fields.set("ctl00$MainContent$ddlComplementos", "-1");
        fields.set("ctl00$MainContent$hfInicialBool", "false");
        fields
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: u32, end: u32) -> QueryWindow {
        QueryWindow::new(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(), start, end).unwrap()
    }

    #[test]
    fn received_search_encodes_window_as_drop_downs() {
        let filter = QueryFilter::for_window(
            DownloadType::Received,
            window(3601, 7200),
            VoucherState::Active,
        );
        let fields = filter.encoder().search_fields(&filter);

        assert_eq!(fields.get("ctl00$MainContent$CldFecha$DdlAnio"), Some("2024"));
        assert_eq!(fields.get("ctl00$MainContent$CldFecha$DdlMes"), Some("3"));
        assert_eq!(fields.get("ctl00$MainContent$CldFecha$DdlDia"), Some("07"));
        assert_eq!(fields.get("ctl00$MainContent$CldFecha$DdlHora"), Some("01"));
        assert_eq!(fields.get("ctl00$MainContent$CldFecha$DdlMinuto"), Some("00"));
        assert_eq!(fields.get("ctl00$MainContent$CldFecha$DdlHoraFin"), Some("01"));
        assert_eq!(fields.get("ctl00$MainContent$CldFecha$DdlMinutoFin"), Some("59"));
        assert_eq!(fields.get("ctl00$MainContent$CldFecha$DdlSegundoFin"), Some("59"));
        assert_eq!(fields.get("ctl00$MainContent$FiltroCentral"), Some("RdoFechas"));
        assert_eq!(fields.get("ctl00$MainContent$DdlEstadoComprobante"), Some("1"));
        assert_eq!(fields.get("__ASYNCPOST"), Some("true"));
    }

    #[test]
    fn cancelled_state_is_encoded_as_zero() {
        let filter = QueryFilter::for_window(
            DownloadType::Issued,
            window(1, 86_400),
            VoucherState::Cancelled,
        );
        let fields = filter.encoder().search_fields(&filter);
        assert_eq!(fields.get("ctl00$MainContent$DdlEstadoComprobante"), Some("0"));
    }

    #[test]
    fn issued_search_uses_date_range_controls() {
        let filter = QueryFilter::for_window(
            DownloadType::Issued,
            window(1, 86_400),
            VoucherState::Active,
        );
        let fields = filter.encoder().search_fields(&filter);

        assert_eq!(
            fields.get("ctl00$MainContent$CldFechaInicial2$Calendario_text"),
            Some("07/03/2024")
        );
        assert_eq!(fields.get("ctl00$MainContent$CldFechaInicial2$DdlHora"), Some("00"));
        assert_eq!(fields.get("ctl00$MainContent$CldFechaFinal2$DdlHora"), Some("23"));
        assert_eq!(fields.get("ctl00$MainContent$CldFechaFinal2$DdlSegundo"), Some("59"));
        assert!(fields.get("ctl00$MainContent$CldFecha$DdlAnio").is_none());
    }

    #[test]
    fn document_filter_switches_central_filter_to_folio() {
        let filter = QueryFilter::for_document(
            DownloadType::Received,
            "5F2A1C3E-0000-4000-8000-000000000001",
            VoucherState::Active,
        );
        let fields = filter.encoder().search_fields(&filter);
        assert_eq!(fields.get("ctl00$MainContent$FiltroCentral"), Some("RdoFolioFiscal"));
        assert_eq!(
            fields.get("ctl00$MainContent$TxtUUID"),
            Some("5F2A1C3E-0000-4000-8000-000000000001")
        );
        assert_eq!(fields.get("ctl00$MainContent$CldFecha$DdlAnio"), Some("2015"));
    }

    #[test]
    fn date_selection_targets_the_date_radio() {
        let filter = QueryFilter::for_window(
            DownloadType::Received,
            window(1, 10),
            VoucherState::Active,
        );
        let fields = filter.encoder().date_selection_fields(&filter);
        assert_eq!(fields.get("__EVENTTARGET"), Some("ctl00$MainContent$RdoFechas"));
        assert_eq!(
            fields.get("ctl00$ScriptManager1"),
            Some("ctl00$MainContent$UpnlBusqueda|ctl00$MainContent$RdoFechas")
        );
    }
}
