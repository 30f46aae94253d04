use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use crate::analysis::pipeline::PricingPipeline;
use crate::analysis::state::AppState;
use crate::analysis::types::{AnalysisRecord, AnalysisRequest};
use crate::monitoring::logger::CsvLogger;
use crate::monitoring::report::ReportMailer;

/// Runs the pipeline with the current favorites, then records, logs and
/// reports the result.
pub struct AnalysisService {
    pipeline: PricingPipeline,
    state: Arc<AppState>,
    csv_logger: Option<CsvLogger>,
    mailer: Option<ReportMailer>,
}

impl AnalysisService {
    pub fn new(
        pipeline: PricingPipeline,
        state: Arc<AppState>,
        csv_logger: Option<CsvLogger>,
        mailer: Option<ReportMailer>,
    ) -> Self {
        Self {
            pipeline,
            state,
            csv_logger,
            mailer,
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisRecord> {
        let favorites = self.state.favorites();
        let record = self.pipeline.run(&request, &favorites).await?;
        let record = self.state.record_analysis(record).await;

        if let Some(logger) = &self.csv_logger {
            if let Err(e) = logger.log_analysis(&record) {
                warn!("Failed to write CSV log: {:#}", e);
            }
        }

        if let Some(mailer) = &self.mailer {
            if let Err(e) = mailer.send(&record).await {
                warn!("Failed to send report: {:#}", e);
            }
        }

        info!(
            "✅ Analysis {} done: R${:.2} ({})",
            record.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
            record.pricing.suggested_price,
            record.pricing.strategy_label
        );

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::persistence::AnalysisDatabase;
    use crate::analysis::pipeline::testing::{pipeline, StubCompetitors};
    use crate::analysis::types::FavoriteListing;
    use crate::data::types::{CompetitorListing, FetchOutcome};

    #[tokio::test]
    async fn test_analyze_records_with_favorites() {
        let stub = Arc::new(StubCompetitors::new(FetchOutcome::Available(vec![
            CompetitorListing::new("Casa", 150.0, false),
        ])));
        let state = Arc::new(AppState::new(10));
        state
            .add_favorite(FavoriteListing::new("https://www.airbnb.com.br/rooms/5", "Fav", 400.0, false))
            .unwrap();

        let service = AnalysisService::new(
            pipeline(stub, FetchOutcome::Unavailable("down".into())),
            state.clone(),
            None,
            None,
        );

        let request = AnalysisRequest::new("2026-01-13", "2026-01-15", 2, false, None).unwrap();
        let record = service.analyze(request).await.unwrap();

        assert_eq!(record.pricing.market.favorites.count, 1);
        assert_eq!(state.latest().await, Some(record));
        assert_eq!(service.state().history(5).await.len(), 1);
    }

    #[tokio::test]
    async fn test_stored_favorite_with_bad_price_still_prices() {
        let db = Arc::new(AnalysisDatabase::new(":memory:").unwrap());
        db.upsert_favorite(&FavoriteListing::new("https://www.airbnb.com.br/rooms/9", "Fav", -10.0, false))
            .unwrap();
        let state = Arc::new(AppState::with_database(10, db).unwrap());
        assert_eq!(state.favorites().len(), 1);

        let stub = Arc::new(StubCompetitors::new(FetchOutcome::Available(vec![
            CompetitorListing::new("Casa", 150.0, false),
        ])));
        let service = AnalysisService::new(
            pipeline(stub, FetchOutcome::Unavailable("down".into())),
            state,
            None,
            None,
        );

        let request = AnalysisRequest::new("2026-01-13", "2026-01-15", 2, false, None).unwrap();
        let record = service.analyze(request).await.unwrap();

        assert!(!record.pricing.is_fallback());
        assert_eq!(record.pricing.market.favorites.count, 0);
        assert_eq!(record.id, Some(1));
    }
}
