use crate::models::{InteractionEvent, InteractionType, UserProfile, ViewedProduct};
use chrono::{DateTime, Timelike, Utc};

pub const DEFAULT_PRICE_WINDOW: usize = 20;
pub const DEFAULT_RECENTLY_VIEWED_CAP: usize = 50;

/// Folds interaction events into a profile. Pure: persistence belongs to the caller.
#[derive(Debug, Clone, Copy)]
pub struct InterestAggregator {
    price_window: usize,
    recently_viewed_cap: usize,
}

impl Default for InterestAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_PRICE_WINDOW, DEFAULT_RECENTLY_VIEWED_CAP)
    }
}

impl InterestAggregator {
    pub fn new(price_window: usize, recently_viewed_cap: usize) -> Self {
        Self {
            price_window: price_window.max(1),
            recently_viewed_cap: recently_viewed_cap.max(1),
        }
    }

    pub fn fold(&self, profile: &mut UserProfile, event: &InteractionEvent) {
        if let Some(category) = non_empty(event.category.as_deref()) {
            profile.categories.increment(category);
        }
        if let Some(brand) = non_empty(event.brand.as_deref()) {
            profile.brands.increment(brand);
        }
        if let Some(price) = event.price {
            self.observe_price(profile, price);
        }

        match event.interaction_type {
            InteractionType::ProductView => {
                if let Some(id) = event.product_id {
                    self.push_viewed(profile, id, event.timestamp);
                }
            }
            InteractionType::AddToCart => {
                profile.behavior.conversion_events += 1;
            }
            InteractionType::ProductClick
            | InteractionType::CategoryBrowse
            | InteractionType::WhatsappOrder => {}
        }

        profile.interaction_count += 1;
        if event.timestamp > profile.last_visit {
            profile.last_visit = event.timestamp;
        }
    }

    pub fn observe_price(&self, profile: &mut UserProfile, price: f64) {
        if !price.is_finite() || price <= 0.0 {
            return;
        }

        let prefs = &mut profile.price_preferences;
        prefs.views.push(price);
        if prefs.views.len() > self.price_window {
            let excess = prefs.views.len() - self.price_window;
            prefs.views.drain(..excess);
        }

        prefs.min = prefs.views.iter().copied().fold(f64::INFINITY, f64::min);
        prefs.max = prefs.views.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prefs.average = prefs.views.iter().sum::<f64>() / prefs.views.len() as f64;
    }

    fn push_viewed(&self, profile: &mut UserProfile, id: u64, timestamp: DateTime<Utc>) {
        profile.products_viewed.insert(0, ViewedProduct { id, timestamp });
        profile.products_viewed.truncate(self.recently_viewed_cap);
    }

    /// Folds an end-of-visit report: running average duration over `sessions`,
    /// last scroll depth and the hour of the visit.
    pub fn fold_session_end(
        &self,
        profile: &mut UserProfile,
        duration_ms: f64,
        scroll_depth: Option<f64>,
        ended_at: DateTime<Utc>,
    ) {
        let sessions = profile.sessions.max(1) as f64;
        let behavior = &mut profile.behavior;
        behavior.avg_session_duration_ms =
            (behavior.avg_session_duration_ms * (sessions - 1.0) + duration_ms.max(0.0)) / sessions;
        if let Some(depth) = scroll_depth {
            behavior.last_scroll_depth = Some(depth.clamp(0.0, 100.0));
        }
        behavior.preferred_visit_hour = Some(ended_at.hour());
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn view(id: u64, price: f64) -> InteractionEvent {
        InteractionEvent::new(InteractionType::ProductView)
            .with_product(id)
            .with_category("phones")
            .with_brand("acme")
            .with_price(price)
    }

    #[test]
    fn test_price_window_keeps_last_twenty() {
        let aggregator = InterestAggregator::default();
        let mut profile = UserProfile::new("fp_test");
        let prices: Vec<f64> = (1..=21).map(|p| p as f64 * 10.0).collect();
        for (i, price) in prices.iter().enumerate() {
            aggregator.fold(&mut profile, &view(i as u64, *price));
        }

        let prefs = &profile.price_preferences;
        assert_eq!(prefs.views, prices[1..].to_vec());
        let expected = prices[1..].iter().sum::<f64>() / 20.0;
        assert!((prefs.average - expected).abs() < 1e-9);
        assert_eq!(prefs.min, 20.0);
        assert_eq!(prefs.max, 210.0);
    }

    #[test]
    fn test_recently_viewed_is_capped_and_newest_first() {
        let aggregator = InterestAggregator::default();
        let mut profile = UserProfile::new("fp_test");
        let start = Utc::now();
        for id in 0..60u64 {
            let event = view(id, 5.0).at(start + Duration::seconds(id as i64));
            aggregator.fold(&mut profile, &event);
        }
        assert_eq!(profile.products_viewed.len(), 50);
        assert_eq!(profile.products_viewed[0].id, 59);
        assert_eq!(profile.products_viewed[49].id, 10);
    }

    #[test]
    fn test_counters_initialize_to_one() {
        let aggregator = InterestAggregator::default();
        let mut profile = UserProfile::new("fp_test");
        aggregator.fold(
            &mut profile,
            &InteractionEvent::new(InteractionType::CategoryBrowse).with_category("audio"),
        );
        assert_eq!(profile.categories.get("audio"), Some(1));
        assert!(profile.brands.is_empty());
        assert!(profile.products_viewed.is_empty());
        assert_eq!(profile.interaction_count, 1);
    }

    #[test]
    fn test_non_positive_prices_are_ignored() {
        let aggregator = InterestAggregator::default();
        let mut profile = UserProfile::new("fp_test");
        aggregator.observe_price(&mut profile, 0.0);
        aggregator.observe_price(&mut profile, -3.0);
        assert!(profile.price_preferences.views.is_empty());
        assert_eq!(profile.average_price(), 0.0);
    }

    #[test]
    fn test_add_to_cart_counts_conversion() {
        let aggregator = InterestAggregator::default();
        let mut profile = UserProfile::new("fp_test");
        aggregator.fold(
            &mut profile,
            &InteractionEvent::new(InteractionType::AddToCart).with_product(3),
        );
        assert_eq!(profile.behavior.conversion_events, 1);
        assert!(profile.products_viewed.is_empty());
    }

    #[test]
    fn test_session_end_running_average() {
        let aggregator = InterestAggregator::default();
        let mut profile = UserProfile::new("fp_test");
        aggregator.fold_session_end(&mut profile, 1000.0, Some(40.0), Utc::now());
        profile.start_session(Utc::now());
        aggregator.fold_session_end(&mut profile, 3000.0, Some(120.0), Utc::now());
        assert!((profile.behavior.avg_session_duration_ms - 2000.0).abs() < 1e-9);
        assert_eq!(profile.behavior.last_scroll_depth, Some(100.0));
        assert!(profile.behavior.preferred_visit_hour.is_some());
    }
}
