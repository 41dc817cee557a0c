//! The pure merge, filter and sort step.

use crate::types::SharedRecord;
use crate::view::{MergedView, SessionWindow, ViewState};

/// Builds the display view from both channel buffers.
///
/// - The service buffer is always included; the infra buffer only when
///   `show_infra` is set.
/// - Without `show_previous`, records older than the session window are
///   dropped, except that the most recent record survives if dropping would
///   otherwise leave an empty view over non-empty input.
/// - Output is sorted by `(created_at, sequence_id)` and free of duplicate
///   sequence ids.
///
/// The result depends only on the inputs, so unchanged inputs give an equal
/// view.
#[must_use]
pub fn merge_filter_sort(
    service: &[SharedRecord],
    infra: &[SharedRecord],
    view: &ViewState,
    window: &SessionWindow,
) -> MergedView {
    let infra: &[SharedRecord] = if view.show_infra { infra } else { &[] };

    let mut merged: Vec<SharedRecord> = service.iter().chain(infra).cloned().collect();
    merged.sort_unstable_by_key(|r| r.sort_key());
    merged.dedup_by_key(|r| r.sequence_id);

    if !view.show_previous {
        let latest = merged.last().cloned();
        merged.retain(|r| !window.is_historical(r.record.created_at()));
        if merged.is_empty() {
            merged.extend(latest);
        }
    }

    MergedView::from(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelKind, LogRecord, RawLogRecord, SequenceId, SequencedRecord};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn shared(kind: ChannelKind, id: u64, created_at: i64) -> SharedRecord {
        Arc::new(SequencedRecord {
            sequence_id: SequenceId(id),
            record: LogRecord::from_raw(kind, RawLogRecord::new(created_at, format!("{kind} {id}"))),
        })
    }

    fn all_history() -> ViewState {
        ViewState {
            show_infra: true,
            show_previous: true,
            paused: false,
        }
    }

    fn times(view: &MergedView) -> Vec<i64> {
        view.iter().map(|r| r.record.created_at()).collect()
    }

    // ===========================================
    // Ordering
    // ===========================================

    #[test]
    fn sorts_by_timestamp_not_arrival() {
        let service = vec![
            shared(ChannelKind::Service, 1, 100),
            shared(ChannelKind::Service, 2, 200),
            shared(ChannelKind::Service, 3, 150),
        ];

        let view = merge_filter_sort(&service, &[], &all_history(), &SessionWindow::new(0));
        assert_eq!(times(&view), vec![100, 150, 200]);
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let service = vec![shared(ChannelKind::Service, 2, 2_000)];
        let infra = vec![shared(ChannelKind::Infra, 1, 2_000)];

        let view = merge_filter_sort(&service, &infra, &all_history(), &SessionWindow::new(0));
        assert_eq!(view.sequence_ids(), vec![SequenceId(1), SequenceId(2)]);
    }

    #[test]
    fn interleaves_channels() {
        let service = vec![
            shared(ChannelKind::Service, 1, 10),
            shared(ChannelKind::Service, 3, 30),
        ];
        let infra = vec![shared(ChannelKind::Infra, 2, 20)];

        let view = merge_filter_sort(&service, &infra, &all_history(), &SessionWindow::new(0));
        assert_eq!(times(&view), vec![10, 20, 30]);
        assert_eq!(view.as_slice()[1].record.kind(), ChannelKind::Infra);
    }

    #[test]
    fn duplicate_sequence_ids_collapse() {
        let record = shared(ChannelKind::Service, 1, 10);
        let service = vec![Arc::clone(&record), record];

        let view = merge_filter_sort(&service, &[], &all_history(), &SessionWindow::new(0));
        assert_eq!(view.len(), 1);
    }

    // ===========================================
    // Infra visibility
    // ===========================================

    #[test]
    fn hidden_infra_contributes_nothing() {
        let service = vec![shared(ChannelKind::Service, 1, 10)];
        let infra = vec![shared(ChannelKind::Infra, 2, 20)];
        let state = ViewState {
            show_infra: false,
            ..all_history()
        };

        let view = merge_filter_sort(&service, &infra, &state, &SessionWindow::new(0));
        assert_eq!(view.len(), 1);
        assert_eq!(view.as_slice()[0].record.kind(), ChannelKind::Service);
    }

    // ===========================================
    // Replay window
    // ===========================================

    #[test]
    fn historical_records_hidden_by_default() {
        let service = vec![
            shared(ChannelKind::Service, 1, 500),
            shared(ChannelKind::Service, 2, 1_000),
            shared(ChannelKind::Service, 3, 1_500),
        ];

        let view = merge_filter_sort(&service, &[], &ViewState::default(), &SessionWindow::new(1_000));
        assert_eq!(times(&view), vec![1_000, 1_500]);
    }

    #[test]
    fn show_previous_includes_history() {
        let service = vec![
            shared(ChannelKind::Service, 1, 500),
            shared(ChannelKind::Service, 2, 1_500),
        ];

        let view = merge_filter_sort(&service, &[], &all_history(), &SessionWindow::new(1_000));
        assert_eq!(times(&view), vec![500, 1_500]);
    }

    #[test]
    fn keeps_latest_record_instead_of_empty_view() {
        let service = vec![
            shared(ChannelKind::Service, 1, 700),
            shared(ChannelKind::Service, 2, 500),
        ];

        let view = merge_filter_sort(&service, &[], &ViewState::default(), &SessionWindow::new(1_000));
        assert_eq!(times(&view), vec![700]);
    }

    #[test]
    fn empty_input_gives_empty_view() {
        let view = merge_filter_sort(&[], &[], &ViewState::default(), &SessionWindow::new(1_000));
        assert!(view.is_empty());
    }

    #[test]
    fn recompute_is_idempotent() {
        let service = vec![
            shared(ChannelKind::Service, 1, 30),
            shared(ChannelKind::Service, 3, 10),
        ];
        let infra = vec![shared(ChannelKind::Infra, 2, 10)];
        let window = SessionWindow::new(0);

        let first = merge_filter_sort(&service, &infra, &ViewState::default(), &window);
        let second = merge_filter_sort(&service, &infra, &ViewState::default(), &window);
        assert_eq!(first, second);
    }

    // ===========================================
    // Properties
    // ===========================================

    fn arrivals() -> impl Strategy<Value = Vec<(bool, i64)>> {
        prop::collection::vec((any::<bool>(), 0i64..50), 0..60)
    }

    fn buffers(arrivals: &[(bool, i64)]) -> (Vec<SharedRecord>, Vec<SharedRecord>) {
        let mut service = Vec::new();
        let mut infra = Vec::new();
        for (index, (is_infra, created_at)) in arrivals.iter().enumerate() {
            let id = index as u64 + 1;
            if *is_infra {
                infra.push(shared(ChannelKind::Infra, id, *created_at));
            } else {
                service.push(shared(ChannelKind::Service, id, *created_at));
            }
        }
        (service, infra)
    }

    proptest! {
        #[test]
        fn output_is_ordered_and_unique(
            arrivals in arrivals(),
            show_infra in any::<bool>(),
            show_previous in any::<bool>(),
            opened_at in 0i64..50,
        ) {
            let (service, infra) = buffers(&arrivals);
            let state = ViewState { show_infra, show_previous, paused: false };
            let view = merge_filter_sort(&service, &infra, &state, &SessionWindow::new(opened_at));

            let keys: Vec<_> = view.iter().map(|r| r.sort_key()).collect();
            prop_assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
        }

        #[test]
        fn replay_window_respected(arrivals in arrivals(), opened_at in 0i64..50) {
            let (service, infra) = buffers(&arrivals);
            let window = SessionWindow::new(opened_at);
            let view = merge_filter_sort(&service, &infra, &ViewState::default(), &window);

            let historical = view.iter().filter(|r| window.is_historical(r.record.created_at())).count();
            prop_assert!(historical == 0 || (historical == 1 && view.len() == 1));
            prop_assert_eq!(view.is_empty(), arrivals.is_empty());
        }

        #[test]
        fn showing_infra_reveals_every_infra_record(arrivals in arrivals()) {
            let (service, infra) = buffers(&arrivals);
            let view = merge_filter_sort(&service, &infra, &all_history(), &SessionWindow::new(0));

            let shown = view.iter().filter(|r| r.record.kind() == ChannelKind::Infra).count();
            prop_assert_eq!(shown, infra.len());
            prop_assert_eq!(view.len(), arrivals.len());
        }
    }
}
