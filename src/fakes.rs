//! In-memory source and sink shared by the pipeline and listener tests.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use crate::error::ScreenerError;
use crate::find_tickers::TickerSource;
use crate::telegram::DeliverySink;

pub struct FixedSource(pub Value);

#[async_trait]
impl TickerSource for FixedSource {
    async fn fetch_tickers(&self) -> Result<Value, ScreenerError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "fixture".to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text(String, String),
    Document(String, String, Vec<u8>),
}

#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<Sent>>,
    pub reject: bool,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), ScreenerError> {
        if self.reject {
            return Err(ScreenerError::DeliveryRejected("Forbidden: bot was blocked".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Text(chat_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ScreenerError> {
        self.sent.lock().unwrap().push(Sent::Document(
            chat_id.to_string(),
            file_name.to_string(),
            bytes,
        ));
        Ok(())
    }
}
