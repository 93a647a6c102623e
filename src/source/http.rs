use crate::ingest::raw_record::RawRecord;
use crate::source::error::SourceError;
use crate::source::ObservationSource;
use bon::bon;
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_SOURCE_URL: &str = "https://disdagkopukm.wonosobokab.go.id/api/produk-komoditas";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const REGION_PLACEHOLDER: &str = "{region}";

#[derive(Deserialize)]
#[serde(untagged)]
enum Body {
    List(Vec<Value>),
    Wrapped { data: Vec<Value> },
}

/// Fetches raw records from a JSON endpoint. The body is either an array of
/// records or an object with the array under `data`.
#[derive(Debug, Clone)]
pub struct HttpObservationSource {
    url: String,
    client: Client,
}

#[bon]
impl HttpObservationSource {
    /// A `{region}` placeholder in `url` is replaced by the fetched region; without
    /// one the region is sent as a `region` query parameter.
    #[builder]
    pub fn new(
        #[builder(into, default = DEFAULT_SOURCE_URL.to_string())] url: String,
        #[builder(default = DEFAULT_TIMEOUT)] timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(SourceError::ClientBuild)?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request_url(&self, region: &str) -> (String, bool) {
        if self.url.contains(REGION_PLACEHOLDER) {
            (self.url.replace(REGION_PLACEHOLDER, region), false)
        } else {
            (self.url.clone(), true)
        }
    }
}

/// Reads a feed body fetched from `url`. Elements that are not record objects are
/// skipped one by one, so a single bad element never drops the rest of the batch.
pub fn parse_body(url: &str, body: &str) -> Result<Vec<RawRecord>, SourceError> {
    let elements = match serde_json::from_str::<Body>(body) {
        Ok(Body::List(elements)) | Ok(Body::Wrapped { data: elements }) => elements,
        // Re-parse as a plain array for a meaningful error message.
        Err(_) => serde_json::from_str::<Vec<Value>>(body)
            .map_err(|e| SourceError::Parse(url.to_string(), e))?,
    };

    let total = elements.len();
    let records: Vec<RawRecord> = elements
        .into_iter()
        .enumerate()
        .filter_map(|(index, element)| {
            if !element.is_object() {
                warn!("Skipping element {} from {}: not an object", index, url);
                return None;
            }
            serde_json::from_value(element)
                .map_err(|e| warn!("Skipping element {} from {}: {}", index, url, e))
                .ok()
        })
        .collect();
    if records.len() < total {
        warn!("Kept {} of {} elements from {}", records.len(), total, url);
    }
    Ok(records)
}

impl ObservationSource for HttpObservationSource {
    async fn fetch(&self, region: &str) -> Result<Vec<RawRecord>, SourceError> {
        let (url, with_query) = self.request_url(region);
        info!("Fetching observations from {}", url);

        let mut request = self.client.get(&url);
        if with_query {
            request = request.query(&[("region", region)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| SourceError::NetworkRequest(url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    SourceError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    SourceError::NetworkRequest(url, e)
                });
            }
        };

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::NetworkRequest(url.clone(), e))?;
        let records = parse_body(&url, &body)?;
        info!("Fetched {} records from {}", records.len(), url);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::raw_record::RawNumber;

    #[test]
    fn parses_plain_and_wrapped_bodies() {
        let plain = r#"[{"komoditas":"Cabai","harga":45000}]"#;
        let wrapped = r#"{"status":"ok","data":[{"komoditas":"Cabai","harga":"45000"},{"komoditas":"Bawang"}]}"#;
        assert_eq!(parse_body("u", plain).unwrap().len(), 1);
        let records = parse_body("u", wrapped).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].entity.as_deref(), Some("Bawang"));
    }

    #[test]
    fn bad_elements_do_not_drop_the_batch() {
        let body = r#"{"data":[
            {"komoditas":"Cabai","pasar":"Pasar Wage","tanggal":"2024-01-01","harga":45000},
            "oops",
            42,
            {"komoditas":"Bawang","pasar":"Pasar Wage","tanggal":"2024-01-01","harga":{"nested":1}},
            null,
            {"komoditas":["Tomat"],"pasar":"Pasar Wage","tanggal":"2024-01-01","harga":"9000"}
        ]}"#;
        let records = parse_body("u", body).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].entity.as_deref(), Some("Cabai"));
        assert_eq!(records[1].entity.as_deref(), Some("Bawang"));
        assert_eq!(records[1].price, None);
        assert_eq!(records[2].entity, None);
        assert_eq!(records[2].price, Some(RawNumber::Text("9000".to_string())));
    }

    #[test]
    fn rejects_unrecognised_body() {
        let err = parse_body("http://feed", r#"{"message":"down"}"#).unwrap_err();
        assert!(matches!(err, SourceError::Parse(url, _) if url == "http://feed"));
    }

    #[test]
    fn region_placeholder_or_query() {
        let source = HttpObservationSource::builder()
            .url("http://feed/{region}/prices")
            .build()
            .unwrap();
        assert_eq!(
            source.request_url("wonosobo"),
            ("http://feed/wonosobo/prices".to_string(), false)
        );

        let source = HttpObservationSource::builder().build().unwrap();
        assert_eq!(source.url(), DEFAULT_SOURCE_URL);
        assert!(source.request_url("wonosobo").1);
    }
}
