//! Insight kinds: prompts and fallback texts.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// The four narrative insights produced per screened symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// News and social sentiment, with key drivers.
    Sentiment,
    /// Latest earnings call summary.
    EarningsCall,
    /// Business model, growth prospects and risks.
    Outlook,
    /// Valuation read from a value investor's point of view.
    ValuePerspective,
}

impl InsightKind {
    pub const ALL: [InsightKind; 4] = [
        InsightKind::Sentiment,
        InsightKind::EarningsCall,
        InsightKind::Outlook,
        InsightKind::ValuePerspective,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::Sentiment => "sentiment",
            InsightKind::EarningsCall => "earnings_call",
            InsightKind::Outlook => "outlook",
            InsightKind::ValuePerspective => "value_perspective",
        }
    }

    /// Text substituted when generation is unavailable.
    pub fn fallback(&self) -> &'static str {
        match self {
            InsightKind::Sentiment => "No sentiment analysis available",
            InsightKind::EarningsCall => "No earnings call analysis available",
            InsightKind::Outlook => "No stock insights available",
            InsightKind::ValuePerspective => "No value investing analysis available",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            InsightKind::Sentiment => {
                "You are a market sentiment analyst who is looking for stocks that are \
                 undervalued and have a good chance of growth. Focus on key factors like \
                 news, earnings, and market sentiment."
            }
            InsightKind::EarningsCall => {
                "You are a financial analyst who is looking for stocks that are \
                 undervalued and have a good chance of growth. Provide key insights \
                 from the earnings call."
            }
            InsightKind::Outlook => {
                "You are a financial analyst who is looking for stocks that are \
                 undervalued and have a good chance of growth. Provide a summary of \
                 key investment insights."
            }
            InsightKind::ValuePerspective => {
                "You are a value investor who is looking for stocks that are \
                 undervalued and have a good chance of growth. Compare key financial \
                 metrics with the industry and provide an investment recommendation."
            }
        }
    }

    pub fn user_prompt(&self, symbol: &str) -> String {
        match self {
            InsightKind::Sentiment => format!(
                "Provide a sentiment analysis for stock {symbol} based on recent news \
                 and social media posts. Is the sentiment positive, negative, or \
                 neutral? Focus on key drivers (e.g., earnings reports, news events, \
                 market sentiment) Be concise and to the point, maximum 2 sentences."
            ),
            InsightKind::EarningsCall => format!(
                "Summarize the latest earnings call for stock {symbol}. Highlight key \
                 points such as management outlook, risks, opportunities, and financial \
                 performance. Be concise and to the point, maximum 2 sentences."
            ),
            InsightKind::Outlook => format!(
                "Analyze stock {symbol}. Include its business model, growth prospects, \
                 financial performance, and risks. Provide key investment takeaways. \
                 Be concise and to the point, maximum 2 sentences."
            ),
            InsightKind::ValuePerspective => format!(
                "Evaluate stock {symbol} from a value investor's perspective. Compare \
                 key metrics (PE ratio, PB ratio, ROE) to the industry average and \
                 provide investment recommendations. Be concise and to the point, \
                 maximum 2 sentences."
            ),
        }
    }

    /// Canonical messages document; also the cache key material.
    pub fn messages(&self, symbol: &str) -> Value {
        json!([
            { "role": "system", "content": self.system_prompt() },
            { "role": "user", "content": self.user_prompt(symbol) },
        ])
    }
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
