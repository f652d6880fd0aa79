//! fetch → organize → render.

use std::fmt;

use tracing::info;

use crate::api::{self, ApiClient};
use crate::course::{self, Course, ParseError};
use crate::render::{self, RenderOptions, Stats};

pub struct Pipeline {
    client: ApiClient,
    options: RenderOptions,
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct Report {
    pub course: Course,
    pub text: String,
    pub stats: Stats,
}

#[derive(Debug)]
pub enum PipelineError {
    Api(api::Error),
    Parse(ParseError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(e) => write!(f, "{e}"),
            Self::Parse(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Api(e) => Some(e),
            Self::Parse(e) => Some(e),
        }
    }
}

impl From<api::Error> for PipelineError {
    fn from(e: api::Error) -> Self {
        Self::Api(e)
    }
}

impl From<ParseError> for PipelineError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl Pipeline {
    pub fn new(client: ApiClient, options: RenderOptions) -> Self {
        Self { client, options }
    }

    pub async fn run(&self, url: &str) -> Result<Report, PipelineError> {
        let value = self.client.fetch_json(url).await?;
        let course = course::organize(Course::from_json(url.trim(), &value)?);
        let text = render::render(&course, &self.options);
        let stats = Stats::of(&course, &self.options);
        info!(
            "📦 Rendered {} topics, {} classes, {} videos, {} PDFs ({} bytes)",
            stats.topics,
            stats.classes,
            stats.videos,
            stats.pdfs,
            text.len()
        );
        Ok(Report { course, text, stats })
    }
}
