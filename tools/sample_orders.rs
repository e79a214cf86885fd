//! Sample Order Generator
//!
//! Generates random orders, scores them with the configured artifacts, and
//! reports how many were flagged. Useful for smoke-testing a new model drop
//! before it is served.

use chrono::{Duration as ChronoDuration, FixedOffset, Offset, Utc};
use order_fraud_scoring::{AppConfig, OrderRecord, Scorer};
use rand::Rng;
use std::time::Instant;
use tracing::info;

/// Order generator for testing
struct OrderGenerator {
    rng: rand::rngs::ThreadRng,
    order_counter: i64,
}

impl OrderGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            order_counter: 0,
        }
    }

    /// Generate a random ordinary order
    fn generate_legitimate(&mut self) -> OrderRecord {
        self.order_counter += 1;
        let hours_ago = self.rng.gen_range(0..72);
        let number_of_orders = self.rng.gen_range(3..60);
        let mean_items = self.rng.gen_range(1.0..4.0);

        OrderRecord {
            user_id: self.rng.gen_range(1..5_000_000),
            nm_id: 1_000_000 + self.order_counter,
            created_date: self.random_timestamp(hours_ago),
            service: "nnsz".to_string(),
            total_ordered: self.rng.gen_range(1..6),
            payment_type: self.random_choice(&["CRD", "CRD", "BAL", "CSH"]).to_string(),
            is_paid: self.rng.gen_bool(0.9),
            count_items: self.rng.gen_range(1..5),
            unique_items: self.rng.gen_range(1..4),
            avg_unique_purchase: self.rng.gen_range(1.0..2.0),
            is_courier: i64::from(self.rng.gen_bool(0.3)),
            nm_age: self.rng.gen_range(30..900),
            distance: self.rng.gen_range(0..800),
            days_after_registration: self.rng.gen_range(90..2500),
            number_of_orders,
            number_of_ordered_items: number_of_orders * self.rng.gen_range(1..4),
            mean_number_of_ordered_items: mean_items,
            min_number_of_ordered_items: 1,
            max_number_of_ordered_items: self.rng.gen_range(2..10),
            mean_percent_of_ordered_items: self.rng.gen_range(40.0..100.0),
        }
    }

    /// Generate a suspicious order
    fn generate_suspicious(&mut self) -> OrderRecord {
        self.order_counter += 1;
        let hours_ago = self.rng.gen_range(0..6);
        let total_ordered = self.rng.gen_range(200..3000);

        OrderRecord {
            user_id: self.rng.gen_range(1..5_000_000),
            nm_id: 1_000_000 + self.order_counter,
            created_date: self.random_timestamp(hours_ago),
            service: self.random_choice(&["nnsz", "ppsz", "mrkt"]).to_string(),
            total_ordered,
            payment_type: self.random_choice(&["CSH", "SBP", "PPL"]).to_string(),
            is_paid: false,
            count_items: self.rng.gen_range(20..200),
            unique_items: self.rng.gen_range(1..3),
            avg_unique_purchase: self.rng.gen_range(10.0..150.0),
            is_courier: 0,
            nm_age: self.rng.gen_range(0..20),
            distance: self.rng.gen_range(1500..6000),
            days_after_registration: self.rng.gen_range(0..14),
            number_of_orders: self.rng.gen_range(0..3),
            number_of_ordered_items: total_ordered,
            mean_number_of_ordered_items: self.rng.gen_range(100.0..900.0),
            min_number_of_ordered_items: self.rng.gen_range(50..200),
            max_number_of_ordered_items: total_ordered,
            mean_percent_of_ordered_items: self.rng.gen_range(0.0..20.0),
        }
    }

    /// Timestamp within the last few days, at a Moscow offset
    fn random_timestamp(&mut self, max_hours_ago: i64) -> String {
        let offset = FixedOffset::east_opt(3 * 3600).unwrap_or_else(|| Utc.fix());
        let minutes_ago = self.rng.gen_range(0..=max_hours_ago * 60);
        (Utc::now() - ChronoDuration::minutes(minutes_ago))
            .with_timezone(&offset)
            .to_rfc3339()
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_orders=info".parse()?)
                .add_directive("order_fraud_scoring=info".parse()?),
        )
        .init();

    info!("Starting Sample Order Generator");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let config_path = args.get(1).map(|s| s.as_str()).unwrap_or("config/config.toml");
    let count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args
        .get(3)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.1_f64)
        .clamp(0.0, 1.0);

    info!(
        config = %config_path,
        count = count,
        fraud_rate = fraud_rate,
        "Configuration loaded"
    );

    let config = AppConfig::load_from_path(config_path)?;
    let scorer = Scorer::load(&config)?;
    info!(
        model = scorer.model_name(),
        policy = scorer.policy().as_str(),
        features = scorer.schema().len(),
        "Scorer ready"
    );

    let mut generator = OrderGenerator::new();
    let mut rng = rand::thread_rng();
    let mut orders = Vec::with_capacity(count);
    let mut suspicious = Vec::with_capacity(count);

    for _ in 0..count {
        if rng.gen_bool(fraud_rate) {
            suspicious.push(true);
            orders.push(generator.generate_suspicious());
        } else {
            suspicious.push(false);
            orders.push(generator.generate_legitimate());
        }
    }

    if let Some(first) = orders.first() {
        info!("Sample order:\n{}", serde_json::to_string_pretty(first)?);
    }

    let start = Instant::now();
    let mut flagged_legitimate = 0;
    let mut flagged_suspicious = 0;

    for (chunk_idx, chunk) in orders.chunks(scorer.max_batch_size().max(1)).enumerate() {
        let results = scorer.score_batch(chunk)?;
        let offset = chunk_idx * scorer.max_batch_size().max(1);

        for (i, result) in results.iter().enumerate() {
            if !result.is_fraud {
                continue;
            }
            if suspicious[offset + i] {
                flagged_suspicious += 1;
            } else {
                flagged_legitimate += 1;
            }
        }
    }

    let suspicious_count = suspicious.iter().filter(|s| **s).count();
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Completed! Scored {} orders ({} legitimate, {} suspicious)",
        count,
        count - suspicious_count,
        suspicious_count
    );
    info!(
        "Flagged {}/{} suspicious and {}/{} legitimate orders",
        flagged_suspicious,
        suspicious_count,
        flagged_legitimate,
        count - suspicious_count
    );

    scorer.metrics().print_summary();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_fraud_scoring::FeatureMapper;

    #[test]
    fn test_generated_orders_map_cleanly() {
        let mut generator = OrderGenerator::new();
        let mapper = FeatureMapper::one_hot();

        for _ in 0..50 {
            let legitimate = generator.generate_legitimate();
            let vector = mapper.map(&legitimate).unwrap();
            assert!(vector.fallbacks.is_empty(), "{:?}", vector.fallbacks);

            let suspicious = generator.generate_suspicious();
            assert!(!suspicious.is_paid);
            mapper.map(&suspicious).unwrap();
        }
        assert_eq!(generator.order_counter, 100);
    }
}
