use crate::dom::{Anchor, Dom};
use crate::ratelimit::RateLimiter;
use crate::sync::SyncEngine;
use crate::{Error, Result};
use lapkeu_core::{Action, FormSelection, Locator};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Locators for the stable parts of the report form. Fragments survive the
/// site's id regeneration; full ids do not.
pub mod fields {
    use lapkeu_core::Locator;

    pub fn month_dropdown() -> Locator {
        Locator::attr("ddlBulan")
    }

    pub fn year_dropdown() -> Locator {
        Locator::attr("ddlTahun")
    }

    pub fn show_button() -> Locator {
        Locator::attr("btnTampilkan")
    }

    pub fn no_data_notice() -> Locator {
        Locator::text("Data tidak tersedia")
    }
}

/// Drives the full field-selection sequence for one session.
///
/// Every step routes through the synchronization engine with the locator of
/// the element the *next* step needs, so each postback has settled before
/// the following field change. The rate-limiter's randomized delay runs
/// before every step.
pub struct SelectionController<'a, D> {
    engine: &'a SyncEngine<D>,
    limiter: &'a RateLimiter,
    cancel: &'a CancellationToken,
    timeout: Duration,
}

impl<'a, D: Dom> SelectionController<'a, D> {
    pub fn new(
        engine: &'a SyncEngine<D>,
        limiter: &'a RateLimiter,
        cancel: &'a CancellationToken,
        timeout: Duration,
    ) -> Self {
        Self {
            engine,
            limiter,
            cancel,
            timeout,
        }
    }

    /// Apply the selection from a freshly opened form. Returns the anchor of
    /// the show-report button, ready to submit.
    pub async fn apply(&self, selection: &FormSelection) -> Result<Anchor> {
        tracing::info!(
            "Applying selection: {} with {} categories",
            selection.period,
            selection.categories.len()
        );

        let mut anchor = self
            .engine
            .wait_for(&fields::month_dropdown(), self.timeout)
            .await?;

        for (action, next) in plan(selection) {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.limiter.pause_before_action().await;
            anchor = self
                .engine
                .perform_and_sync(&action, Some(&anchor), &next, self.timeout)
                .await?;
        }

        Ok(anchor)
    }
}

/// The step sequence for a selection: each action paired with the locator
/// whose appearance proves the resulting reload settled.
///
/// Order matters to the site: period first (month, then year), then the
/// category checkboxes, ending on the show-report button.
pub fn plan(selection: &FormSelection) -> Vec<(Action, Locator)> {
    let mut steps = Vec::new();

    steps.push((
        Action::SelectOption {
            field: fields::month_dropdown(),
            value: selection.period.month_label().to_string(),
        },
        fields::year_dropdown(),
    ));

    let first_checkpoint = selection
        .categories
        .first()
        .map(|c| c.checkbox())
        .unwrap_or_else(fields::show_button);
    steps.push((
        Action::SelectOption {
            field: fields::year_dropdown(),
            value: selection.period.year.to_string(),
        },
        first_checkpoint,
    ));

    for (i, category) in selection.categories.iter().enumerate() {
        let next = selection
            .categories
            .get(i + 1)
            .map(|c| c.checkbox())
            .unwrap_or_else(fields::show_button);
        steps.push((
            Action::SetChecked {
                field: category.checkbox(),
                checked: true,
            },
            next,
        ));
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapkeu_core::{Phase, ReportCategory, ReportPeriod};

    fn period() -> ReportPeriod {
        ReportPeriod::new(12, 2024).unwrap()
    }

    #[test]
    fn test_single_phase_plan_sequence() {
        let steps = plan(&Phase::Second.selection(period()));

        assert_eq!(steps.len(), 3);

        // Month first, confirmed by the year dropdown reappearing.
        assert!(matches!(
            &steps[0].0,
            Action::SelectOption { value, .. } if value == "Desember"
        ));
        assert_eq!(steps[0].1, fields::year_dropdown());

        // Year next, confirmed by the phase's checkbox.
        assert!(matches!(
            &steps[1].0,
            Action::SelectOption { value, .. } if value == "2024"
        ));
        assert_eq!(steps[1].1, ReportCategory::IncomeStatement.checkbox());

        // The last checkbox hands off to the show button.
        assert!(matches!(
            &steps[2].0,
            Action::SetChecked { checked: true, .. }
        ));
        assert_eq!(steps[2].1, fields::show_button());
    }

    #[test]
    fn test_shared_pair_plan_checks_both_categories() {
        let steps = plan(&FormSelection::shared_pair(period()));

        assert_eq!(steps.len(), 4);
        assert!(matches!(
            &steps[2].0,
            Action::SetChecked { field, .. } if *field == ReportCategory::IncomeStatement.checkbox()
        ));
        // Second checkbox settles against the third category's checkbox,
        // then the last one against the show button.
        assert_eq!(steps[2].1, ReportCategory::AssetQuality.checkbox());
        assert_eq!(steps[3].1, fields::show_button());
    }

    #[test]
    fn test_empty_category_selection_still_reaches_show_button() {
        let selection = FormSelection {
            period: period(),
            categories: vec![],
        };
        let steps = plan(&selection);

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].1, fields::show_button());
    }
}
