use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::error::{PartsError, Result};
use crate::types::{
    DrawingFile, Part, PartSearch, PartsSchema, StatusField, PART_NAME, PART_NUMBER, QTY_MADE,
};

pub const DEFAULT_BASE_URL: &str = "https://api.notion.com";
pub const NOTION_VERSION: &str = "2025-09-03";

/// Client for the parts data source in Notion.
pub struct NotionClient {
    client: reqwest::Client,
    token: String,
    data_source_id: String,
    base_url: String,
    max_results: usize,
}

impl NotionClient {
    pub fn new(token: String, data_source_id: String, base_url: String, max_results: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            data_source_id,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_results: max_results.max(1),
        }
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/v1/{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value> {
        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = api_error_message(&text);
            warn!(status, %message, "notion API error");
            return Err(PartsError::Api { status, message });
        }
        resp.json()
            .await
            .map_err(|e| PartsError::Parse(e.to_string()))
    }

    /// Parts whose number or name contains `term`, most recently edited first.
    #[instrument(skip(self))]
    pub async fn query_parts(&self, term: &str) -> Result<PartSearch> {
        let path = format!("data_sources/{}/query", self.data_source_id);
        let body = build_query_body(term, self.max_results);
        let value = self
            .send(self.request(reqwest::Method::POST, &path).json(&body))
            .await?;
        let search = PartSearch::from_json(value, self.max_results)?;
        debug!(found = search.parts.len(), truncated = search.truncated, "parts query done");
        Ok(search)
    }

    /// Status options configured on the data source.
    #[instrument(skip(self))]
    pub async fn retrieve_schema(&self) -> Result<PartsSchema> {
        let path = format!("data_sources/{}", self.data_source_id);
        let value = self.send(self.request(reqwest::Method::GET, &path)).await?;
        PartsSchema::from_json(value)
    }

    #[instrument(skip(self))]
    pub async fn get_part(&self, page_id: &str) -> Result<Part> {
        let value = self
            .send(self.request(reqwest::Method::GET, &format!("pages/{page_id}")))
            .await?;
        Part::from_json(value)
    }

    async fn update_properties(&self, page_id: &str, properties: Value) -> Result<Part> {
        let body = json!({ "properties": properties });
        let value = self
            .send(
                self.request(reqwest::Method::PATCH, &format!("pages/{page_id}"))
                    .json(&body),
            )
            .await?;
        Part::from_json(value)
    }

    /// Set one status property. `option` must be one of the schema's options
    /// (matched ignoring case). Returns the updated part.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        page_id: &str,
        field: StatusField,
        option: &str,
    ) -> Result<Part> {
        let schema = self.retrieve_schema().await?;
        let option = schema.resolve_option(field, option)?;
        let part = self
            .update_properties(page_id, status_properties(field, &option))
            .await?;
        info!(page_id, field = %field, %option, "part status updated");
        Ok(part)
    }

    /// Add one to the quantity made, reading the current value first.
    /// An unset quantity counts as zero. Returns the new quantity.
    #[instrument(skip(self))]
    pub async fn increment_quantity(&self, page_id: &str) -> Result<i64> {
        let current = self.get_part(page_id).await?;
        let property = current
            .property_name(QTY_MADE)
            .ok_or_else(|| PartsError::MissingProperty(QTY_MADE.to_string()))?;
        let next = current.qty_made().unwrap_or(0) + 1;
        self.update_properties(page_id, number_properties(&property, next))
            .await?;
        info!(page_id, qty = next, "part quantity incremented");
        Ok(next)
    }

    /// Fetch the bytes of a drawing file. Notion-hosted URLs are pre-signed
    /// and expire, so call this right after reading the part.
    #[instrument(skip(self, file), fields(name = %file.name))]
    pub async fn download_drawing(&self, file: &DrawingFile) -> Result<Vec<u8>> {
        let resp = self.client.get(&file.url).send().await?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Err(PartsError::Api {
                status,
                message: format!("download of {} failed", file.name),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

fn build_query_body(term: &str, page_size: usize) -> Value {
    let term = term.trim();
    json!({
        "filter": {
            "or": [
                { "property": PART_NUMBER, "rich_text": { "contains": term } },
                { "property": PART_NAME, "title": { "contains": term } },
            ]
        },
        "sorts": [{ "timestamp": "last_edited_time", "direction": "descending" }],
        // one extra row tells us whether the list was cut
        "page_size": page_size + 1,
    })
}

fn status_properties(field: StatusField, option: &str) -> Value {
    json!({ (field.property()): { "status": { "name": option } } })
}

fn number_properties(property: &str, value: i64) -> Value {
    json!({ (property): { "number": value } })
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_matches_number_or_name() {
        let body = build_query_body("  upright ", 5);
        let or = body["filter"]["or"].as_array().unwrap();
        assert_eq!(or.len(), 2);
        assert_eq!(or[0]["property"], "Part Number");
        assert_eq!(or[0]["rich_text"]["contains"], "upright");
        assert_eq!(or[1]["property"], "Part Name");
        assert_eq!(or[1]["title"]["contains"], "upright");
        assert_eq!(body["sorts"][0]["timestamp"], "last_edited_time");
        assert_eq!(body["page_size"], 6);
    }

    #[test]
    fn status_update_targets_the_field_property() {
        let props = status_properties(StatusField::Po, "Ordered");
        assert_eq!(props["PO Status"]["status"]["name"], "Ordered");
    }

    #[test]
    fn quantity_update_uses_stored_name() {
        let props = number_properties("qty made", 4);
        assert_eq!(props["qty made"]["number"], 4);
    }

    #[test]
    fn api_errors_surface_the_notion_message() {
        let body = r#"{"object":"error","status":404,"code":"object_not_found","message":"Could not find page"}"#;
        assert_eq!(api_error_message(body), "Could not find page");
        assert_eq!(api_error_message("bad gateway"), "bad gateway");
    }

    #[test]
    fn client_trims_base_url_and_clamps_results() {
        let client = NotionClient::new(
            "secret".to_string(),
            "ds".to_string(),
            "https://api.notion.com/".to_string(),
            0,
        );
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert_eq!(client.max_results(), 1);
    }
}
