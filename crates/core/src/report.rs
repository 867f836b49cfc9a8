//! Self-contained HTML rendering of a stored analysis, its news and any chart reads.

use crate::domain::records::{AnalysisRecord, ChartAnalysis, NewsArticle};
use crate::domain::scoring::Recommendation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

pub const CONTENT_TYPE: &str = "text/html; charset=utf-8";
const MAX_NEWS_ITEMS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub symbol: String,
    pub analysis_result: AnalysisRecord,
    pub news_articles: Vec<NewsArticle>,
    pub chart_analyses: Vec<ChartAnalysis>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: String,
}

pub fn file_name_for(symbol: &str) -> String {
    let safe: String = symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    format!("marketlens-report-{}-{}.html", safe, uuid::Uuid::new_v4())
}

pub fn render(data: &ReportData) -> RenderedReport {
    RenderedReport {
        file_name: file_name_for(&data.symbol),
        content_type: CONTENT_TYPE,
        body: render_html(data),
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn sentiment_class(score: f64) -> &'static str {
    if score >= 60.0 {
        "positive"
    } else if score <= 40.0 {
        "negative"
    } else {
        "neutral"
    }
}

fn recommendation_class(r: Recommendation) -> &'static str {
    match r {
        Recommendation::Bullish => "positive",
        Recommendation::Bearish => "negative",
        Recommendation::Neutral => "neutral",
    }
}

fn rsi_class(rsi: f64) -> &'static str {
    if rsi >= 70.0 {
        "negative"
    } else if rsi <= 30.0 {
        "positive"
    } else {
        "neutral"
    }
}

fn signed_class(v: f64) -> &'static str {
    if v > 0.0 {
        "positive"
    } else {
        "negative"
    }
}

const STYLE: &str = r#"
body { font-family: Arial, sans-serif; line-height: 1.6; color: #1a1a2e; max-width: 800px; margin: 0 auto; padding: 20px; }
.header { text-align: center; border-bottom: 3px solid #d4af37; padding-bottom: 20px; margin-bottom: 30px; }
.logo { color: #d4af37; font-size: 2em; font-weight: bold; }
.symbol-header { background: #1a1a2e; color: white; padding: 20px; border-radius: 10px; text-align: center; margin-bottom: 30px; }
.symbol-header h1 { margin: 0; font-size: 2.5em; color: #d4af37; }
.section { margin-bottom: 30px; padding: 20px; border: 1px solid #ddd; border-radius: 8px; }
.section h2 { border-bottom: 2px solid #d4af37; padding-bottom: 10px; }
.metric-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); gap: 15px; }
.metric { background: #f8f9fa; padding: 15px; border-radius: 5px; text-align: center; }
.metric-label { font-size: 0.9em; color: #666; }
.metric-value { font-size: 1.5em; font-weight: bold; }
.positive { color: #28a745; }
.negative { color: #dc3545; }
.neutral { color: #b8860b; }
.news-item { border-left: 4px solid #d4af37; padding-left: 15px; margin-bottom: 15px; }
.news-meta { font-size: 0.8em; color: #666; }
.disclaimer { background: #ffe6e6; border: 1px solid #ff9999; padding: 20px; border-radius: 8px; margin-top: 30px; }
"#;

fn metric(out: &mut String, label: &str, class: &str, value: &str) {
    let _ = write!(
        out,
        r#"<div class="metric"><div class="metric-label">{label}</div><div class="metric-value {class}">{value}</div></div>"#
    );
}

fn render_html(data: &ReportData) -> String {
    let a = &data.analysis_result;
    let symbol = escape_html(&data.symbol);
    let mut out = String::with_capacity(8 * 1024);

    let _ = write!(
        out,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>MarketLens Analysis Report - {symbol}</title>
<style>{STYLE}</style>
</head>
<body>
<div class="header"><div class="logo">MarketLens</div><div>Financial Analysis Report</div></div>
<div class="symbol-header"><h1>{symbol}</h1><p>Generated {generated}</p></div>
"#,
        generated = data.generated_at.format("%Y-%m-%d %H:%M UTC"),
    );

    out.push_str(r#"<div class="section"><h2>Executive Summary</h2><div class="metric-grid">"#);
    metric(
        &mut out,
        "Overall Sentiment",
        sentiment_class(a.sentiment_score),
        &format!("{:.1}", a.sentiment_score),
    );
    metric(&mut out, "Current Price", "", &format!("${:.2}", a.price));
    metric(
        &mut out,
        "Price Change",
        signed_class(a.price_change),
        &format!("{:+.2}%", a.price_change),
    );
    metric(
        &mut out,
        "Recommendation",
        recommendation_class(a.recommendation),
        &a.recommendation.as_str().to_ascii_uppercase(),
    );
    metric(
        &mut out,
        "Risk Level",
        "",
        &a.risk_level.as_str().to_ascii_uppercase(),
    );
    out.push_str("</div></div>\n");

    let ti = &a.technical_indicators;
    if ti.rsi.is_some() || ti.macd.is_some() || ti.volume_change.is_some() {
        out.push_str(r#"<div class="section"><h2>Technical Analysis</h2><div class="metric-grid">"#);
        if let Some(rsi) = ti.rsi {
            metric(&mut out, "RSI (14)", rsi_class(rsi), &format!("{rsi:.1}"));
        }
        if let Some(macd) = ti.macd {
            metric(&mut out, "MACD", signed_class(macd), &format!("{macd:.3}"));
        }
        if let Some(vc) = ti.volume_change {
            metric(&mut out, "Volume Change", signed_class(vc), &format!("{vc:.1}%"));
        }
        out.push_str("</div></div>\n");
    }

    let _ = write!(
        out,
        r#"<div class="section"><h2>Sentiment Breakdown</h2><p>Based on {} articles.</p><div class="metric-grid">"#,
        a.news_count
    );
    metric(
        &mut out,
        "Positive News",
        "positive",
        &format!("{:.1}%", a.positive_news_percent),
    );
    metric(
        &mut out,
        "Neutral News",
        "neutral",
        &format!("{:.1}%", a.neutral_news_percent),
    );
    metric(
        &mut out,
        "Negative News",
        "negative",
        &format!("{:.1}%", a.negative_news_percent),
    );
    out.push_str("</div></div>\n");

    if !a.key_insights.is_empty() {
        out.push_str(r#"<div class="section"><h2>Key Insights</h2><ul>"#);
        for insight in &a.key_insights {
            let _ = write!(out, "<li>{}</li>", escape_html(insight));
        }
        out.push_str("</ul></div>\n");
    }

    if !data.news_articles.is_empty() {
        out.push_str(r#"<div class="section"><h2>Recent News</h2>"#);
        for n in data.news_articles.iter().take(MAX_NEWS_ITEMS) {
            let _ = write!(
                out,
                r#"<div class="news-item"><div><strong>{title}</strong></div><div class="news-meta">{source} | {date} | Sentiment: <span class="{class}">{sentiment}</span></div>"#,
                title = escape_html(&n.title),
                source = escape_html(&n.source),
                date = n.published_at.format("%Y-%m-%d"),
                class = sentiment_class(n.sentiment_score * 100.0),
                sentiment = n.sentiment,
            );
            if !n.summary.is_empty() {
                let _ = write!(out, "<p>{}</p>", escape_html(&n.summary));
            }
            out.push_str("</div>");
        }
        out.push_str("</div>\n");
    }

    if !data.chart_analyses.is_empty() {
        out.push_str(r#"<div class="section"><h2>Chart Analysis</h2>"#);
        for c in &data.chart_analyses {
            let ca = &c.analysis;
            let _ = write!(
                out,
                "<div><h4>Chart: {}</h4><p><strong>Prediction:</strong> {}</p><p><strong>Trend:</strong> {} (confidence {:.0}%)</p>",
                escape_html(&c.file_name),
                escape_html(&ca.prediction),
                ca.trend_direction.as_str(),
                ca.confidence * 100.0,
            );
            if let Some(s) = ca.support_level {
                let _ = write!(out, "<p><strong>Support Level:</strong> ${s}</p>");
            }
            if let Some(r) = ca.resistance_level {
                let _ = write!(out, "<p><strong>Resistance Level:</strong> ${r}</p>");
            }
            out.push_str("</div>");
        }
        out.push_str("</div>\n");
    }

    out.push_str(
        r#"<div class="disclaimer"><h3>Important Disclaimer</h3>
<p><strong>Not Financial Advice:</strong> This report is for informational purposes only and should not be considered financial, investment or trading advice.</p>
<p><strong>Risk Warning:</strong> Trading stocks and cryptocurrencies carries significant risk of loss. Past performance does not guarantee future results.</p>
<p><strong>Data Accuracy:</strong> Market data and sentiment analysis may contain errors or delays.</p>
</div>
</body>
</html>
"#,
    );

    out
}
