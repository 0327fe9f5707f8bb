use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use pdf_chat_core::session::HistoryMode;
use pdf_chat_extract::{ExtractConfig, ExtractConfigBuilder};
use pdf_chat_openai_model::{OpenAIConfig, OpenAIConfigBuilder};

/// Chat with a language model about the contents of a PDF.
#[derive(Parser, Debug)]
#[command(name = "pdf-chat", version)]
pub struct Args {
    /// PDF to open right away
    pub pdf: Option<PathBuf>,

    /// Text extraction endpoint the PDF is posted to
    #[arg(
        long,
        env = "PDF_CHAT_EXTRACT_URL",
        default_value = "https://api.ajithjoseph.com/api/Pdf/extract-text"
    )]
    pub extract_url: String,

    /// Seconds an extraction request may take
    #[arg(long, default_value_t = 120)]
    pub extract_timeout: u64,

    /// API key of the model provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    /// Model to chat with
    #[arg(long, env = "OPENAI_MODEL")]
    pub model: Option<String>,

    /// Refuse documents whose prompt is longer than this many characters
    #[arg(long)]
    pub max_context_chars: Option<usize>,

    /// How much of the conversation is sent with each question
    #[arg(long, value_enum, default_value_t = HistoryModeArg::Latest)]
    pub history_mode: HistoryModeArg,
}

/// Command line spelling of [`HistoryMode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum HistoryModeArg {
    /// Only the latest question
    Latest,
    /// Every earlier turn as well
    Full,
}

impl From<HistoryModeArg> for HistoryMode {
    fn from(arg: HistoryModeArg) -> Self {
        match arg {
            HistoryModeArg::Latest => HistoryMode::LatestOnly,
            HistoryModeArg::Full => HistoryMode::Full,
        }
    }
}

impl Args {
    pub fn openai_config(&self) -> OpenAIConfig {
        let mut builder = OpenAIConfigBuilder::with_api_key(self.api_key.clone());
        if let Some(base_url) = &self.base_url {
            builder = builder.with_base_url(base_url.clone());
        }
        if let Some(model) = &self.model {
            builder = builder.with_model(model.clone());
        }
        if let Some(max_chars) = self.max_context_chars {
            builder = builder.with_max_context_chars(max_chars);
        }
        builder.build()
    }

    pub fn extract_config(&self) -> ExtractConfig {
        ExtractConfigBuilder::with_endpoint(self.extract_url.clone())
            .with_timeout(Duration::from_secs(self.extract_timeout))
            .build()
    }
}
