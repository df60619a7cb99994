//! Implements the `Sheet` trait using the `sheets::Client` to interact with a Google sheet.

use crate::api::{quote_sheet_name, Sheet, SheetRange};
use crate::error::{Error, ErrorType, Res};
use anyhow::{anyhow, Context};
use reqwest::StatusCode;
use serde_json::json;
use sheets::types::{
    BatchClearValuesRequest, BatchUpdateValuesRequest, DateTimeRenderOption, Dimension,
    ValueInputOption, ValueRange, ValueRenderOption,
};
use sheets::ClientError;
use tracing::trace;
use url::Url;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Reads every column a row store range can address.
const ALL_COLUMNS: &str = "A:Z";

/// Talks to one spreadsheet using a bearer token.
pub(super) struct GoogleSheet {
    spreadsheet_id: String,
    token: String,
    client: sheets::Client,
}

impl GoogleSheet {
    pub(super) fn new(spreadsheet_id: impl Into<String>, token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            client: create_sheets_client(&token),
            token,
        }
    }

    /// `{SHEETS_API}/{spreadsheet_id}:batchUpdate`, which the values client does not cover.
    fn batch_update_url(&self) -> Res<Url> {
        let mut url = Url::parse(SHEETS_API).context("Invalid Sheets API base URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("The Sheets API base URL cannot have path segments"))?
            .push(&format!("{}:batchUpdate", self.spreadsheet_id));
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Sheet for GoogleSheet {
    async fn get(&mut self, sheet_name: &str) -> Res<Vec<Vec<String>>> {
        trace!("get for {sheet_name}");
        let range = format!("{}!{ALL_COLUMNS}", quote_sheet_name(sheet_name));
        let response = self
            .client
            .spreadsheets()
            .values_get(
                &self.spreadsheet_id,
                &range,
                DateTimeRenderOption::FormattedString,
                Dimension::Rows,
                ValueRenderOption::FormattedValue,
            )
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to fetch {sheet_name} sheet data"))?;
        Ok(response.body.values)
    }

    async fn write_ranges(&mut self, data: &[SheetRange]) -> Res<()> {
        trace!("write_ranges for {} ranges", data.len());
        let value_ranges: Vec<ValueRange> = data
            .iter()
            .map(|sr| ValueRange {
                major_dimension: Some(Dimension::Rows),
                range: sr.range.clone(),
                values: sr.values.clone(),
            })
            .collect();

        // Values are stored exactly as given, the sheet does not reinterpret them.
        let request = BatchUpdateValuesRequest {
            data: value_ranges,
            include_values_in_response: Some(false),
            response_date_time_render_option: None,
            response_value_render_option: None,
            value_input_option: Some(ValueInputOption::Raw),
        };

        self.client
            .spreadsheets()
            .values_batch_update(&self.spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .context("Failed to write ranges")?;
        Ok(())
    }

    async fn clear_ranges(&mut self, ranges: &[&str]) -> Res<()> {
        trace!("clear_ranges {ranges:?}");
        let request = BatchClearValuesRequest {
            ranges: ranges.iter().map(|s| s.to_string()).collect(),
        };
        self.client
            .spreadsheets()
            .values_batch_clear(&self.spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to clear ranges: {ranges:?}"))?;
        Ok(())
    }

    async fn create_sheet(&mut self, sheet_name: &str) -> Res<()> {
        trace!("create_sheet {sheet_name}");
        let url = self.batch_update_url()?;
        let request = json!({
            "requests": [
                { "addSheet": { "properties": { "title": sheet_name } } }
            ]
        });
        let response = reqwest::Client::new()
            .post(url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .context("Failed to send the batchUpdate request to the Sheets API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(classify(status, &body).err(format!(
                "Sheets API batchUpdate failed with status {status}: {body}"
            )))
            .with_context(|| format!("Failed to create the {sheet_name} sheet"));
        }
        Ok(())
    }
}

/// Creates a sheets client that authenticates with `access_token`.
fn create_sheets_client(access_token: &str) -> sheets::Client {
    // Only the access token is used for values calls; the OAuth fields stay empty.
    sheets::Client::new(
        String::new(),
        String::new(),
        String::new(),
        access_token.to_string(),
        String::new(),
    )
}

/// Maps an unsuccessful Sheets API response to an `ErrorType`.
fn classify(status: StatusCode, body: &str) -> ErrorType {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ErrorType::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorType::NotAuthenticated,
        StatusCode::BAD_REQUEST if body.contains("Unable to parse range") => {
            ErrorType::TableMissing
        }
        _ => ErrorType::Sheet,
    }
}

/// Wraps a client error in a classified `Error`, named after the failing variant.
fn map_client_error(e: ClientError) -> anyhow::Error {
    let (error_name, error_type) = match &e {
        ClientError::HttpError { status, error, .. } => (
            format!("HttpError {status}"),
            StatusCode::from_u16(status.as_u16())
                .map(|status| classify(status, error))
                .unwrap_or(ErrorType::Sheet),
        ),
        ClientError::ReqwestError(inner) => (format!("ReqwestError {inner}"), ErrorType::Sheet),
        ClientError::SerdeJsonError(inner) => {
            (format!("SerdeJsonError {inner}"), ErrorType::Sheet)
        }
        ClientError::EmptyRefreshToken => ("EmptyRefreshToken".to_string(), ErrorType::Sheet),
        _ => ("ClientError".to_string(), ErrorType::Sheet),
    };
    anyhow::Error::new(Error::new(
        error_type,
        anyhow::Error::new(e).context(error_name),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(StatusCode::TOO_MANY_REQUESTS, ""),
            ErrorType::RateLimited
        );
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED, ""),
            ErrorType::NotAuthenticated
        );
        assert_eq!(
            classify(StatusCode::FORBIDDEN, "PERMISSION_DENIED"),
            ErrorType::NotAuthenticated
        );
        assert_eq!(
            classify(
                StatusCode::BAD_REQUEST,
                r#"{"error":{"message":"Unable to parse range: 'Budgets'!A:Z"}}"#
            ),
            ErrorType::TableMissing
        );
        assert_eq!(
            classify(StatusCode::BAD_REQUEST, "Invalid value"),
            ErrorType::Sheet
        );
        assert_eq!(
            classify(StatusCode::INTERNAL_SERVER_ERROR, ""),
            ErrorType::Sheet
        );
    }

    #[test]
    fn test_client_errors_are_classified() {
        let e = map_client_error(ClientError::EmptyRefreshToken);
        assert_eq!(ErrorType::of(&e), Some(ErrorType::Sheet));
        assert!(format!("{e:#}").contains("EmptyRefreshToken"));
    }

    #[test]
    fn test_batch_update_url_encodes_id() {
        let sheet = GoogleSheet::new("abc 123", "token");
        let url = sheet.batch_update_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc%20123:batchUpdate"
        );
    }
}
