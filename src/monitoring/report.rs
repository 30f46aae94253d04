use anyhow::{anyhow, Context, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};
use crate::analysis::types::AnalysisRecord;
use crate::config::{EnvConfig, ReportConfig};

const TOP_COMPETITORS: usize = 5;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn report_subject(record: &AnalysisRecord) -> String {
    format!(
        "HostLink pricing report {} → {}: R${:.2}",
        record.request.stay.checkin, record.request.stay.checkout, record.pricing.suggested_price
    )
}

/// HTML body of the e-mailed report.
pub fn render_report_html(record: &AnalysisRecord) -> String {
    let pricing = &record.pricing;
    let mut html = String::new();

    html.push_str(&format!(
        "<html><body>\
         <h2>Pricing report</h2>\
         <p><strong>Stay:</strong> {} → {} ({} nights, {} adults)</p>\
         <p><strong>Suggested price:</strong> R${:.2} per night</p>\
         <p><strong>Discount:</strong> {:.1}% below the R${:.2} reference average</p>\
         <p><strong>Strategy:</strong> {}</p>\
         <p><strong>Justification:</strong> {}</p>",
        record.request.stay.checkin,
        record.request.stay.checkout,
        record.nights,
        record.request.adults,
        pricing.suggested_price,
        pricing.discount_percentage,
        pricing.reference_avg,
        escape(&pricing.strategy_label),
        escape(&pricing.justification),
    ));

    if let Some(adj) = &record.weather_adjustment {
        html.push_str(&format!(
            "<h3>Weekend and weather</h3>\
             <p>Adjusted price R${:.2} (×{:.2}, {}, weekend: {}, average rain {:.1}%)</p>",
            adj.adjusted_price,
            adj.multiplier,
            adj.factor.label(),
            if adj.is_weekend { "yes" } else { "no" },
            adj.avg_rain_probability,
        ));
    }

    if !record.weather.is_empty() {
        html.push_str("<h3>Forecast</h3><table><tr><th>Date</th><th>Rain</th><th>Conditions</th></tr>");
        for day in &record.weather {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}%</td><td>{}</td></tr>",
                day.date.format("%d/%m/%Y"),
                day.rain_probability,
                day.condition.label()
            ));
        }
        html.push_str("</table>");
    }

    let mut competitors: Vec<_> = record.competitors.iter().filter(|c| c.has_valid_price()).collect();
    competitors.sort_by(|a, b| a.price_per_night.total_cmp(&b.price_per_night));
    if !competitors.is_empty() {
        html.push_str(&format!(
            "<h3>Competitors ({} analysed, {} similar)</h3><ul>",
            record.total_found, record.similar_count
        ));
        for c in competitors.iter().take(TOP_COMPETITORS) {
            html.push_str(&format!(
                "<li>{} - R${:.2}{}</li>",
                escape(&c.title),
                c.price_per_night,
                if c.is_beachfront { " (beachfront)" } else { "" }
            ));
        }
        html.push_str("</ul>");
    }

    html.push_str("<h3>Recommendations</h3><ul>\
        <li>Watch the competition's prices regularly</li>\
        <li>Consider promotions on days with a high chance of rain</li>\
        <li>Raise prices on weekends with good weather</li>\
        </ul></body></html>");

    html
}

/// Sends analysis reports over SMTP with STARTTLS.
pub struct ReportMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl ReportMailer {
    /// `None` when reports are off or SMTP credentials are missing
    pub fn from_config(report: &ReportConfig, env: &EnvConfig) -> Result<Option<Self>> {
        if !report.enabled {
            return Ok(None);
        }

        let (Some(username), Some(password)) = (env.smtp_username.clone(), env.smtp_password.clone()) else {
            warn!("Reports enabled but SMTP credentials are not configured, skipping reports");
            return Ok(None);
        };

        let recipient = report.recipient.clone().unwrap_or_else(|| username.clone());
        let from = env.smtp_from.clone().unwrap_or_else(|| username.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&env.smtp_host)
            .with_context(|| format!("Failed to create SMTP transport for {}", env.smtp_host))?
            .port(env.smtp_port)
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Some(Self {
            transport,
            from: from.parse().map_err(|e| anyhow!("Invalid from address {}: {}", from, e))?,
            to: recipient.parse().map_err(|e| anyhow!("Invalid recipient {}: {}", recipient, e))?,
        }))
    }

    pub async fn send(&self, record: &AnalysisRecord) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(report_subject(record))
            .header(ContentType::TEXT_HTML)
            .body(render_report_html(record))
            .context("Failed to build report e-mail")?;

        self.transport
            .send(message)
            .await
            .context("Failed to send report e-mail")?;

        info!("📧 Report sent to {}", self.to);
        Ok(())
    }
}
