use crate::effect::FILTER_DEBOUNCE;
use crate::protocol::DEFAULT_DELAY_SECONDS;
use crate::workflow::status;
use crate::{AppState, Effect, Msg, WorkflowOutcome};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::FilterInputChanged(raw) | Msg::RestoreLastFilter(raw) => {
            let generation = state.set_filter_input(&raw);
            let filter = state.filter_input().to_string();
            let mut effects = vec![Effect::PersistLastFilter(filter.clone())];
            if state.filter_active() {
                effects.push(Effect::ScheduleDebounce {
                    generation,
                    delay: FILTER_DEBOUNCE,
                });
            } else if filter.is_empty() {
                // Clearing the box resets page visibility right away.
                effects.push(Effect::SendFilter(String::new()));
            }
            effects
        }
        Msg::DebounceElapsed { generation } => {
            if generation == state.debounce_generation() && state.filter_active() {
                vec![Effect::SendFilter(state.filter_input().to_string())]
            } else {
                Vec::new()
            }
        }
        Msg::FilterApplied {
            filter,
            visible_count,
        } => {
            if !filter.is_empty() && filter == state.filter_input() {
                state.set_filter_result(visible_count);
            }
            Vec::new()
        }
        Msg::FilterFailed { filter, reason } => {
            if !filter.is_empty() && filter == state.filter_input() {
                state.set_filter_failed(&reason);
            }
            Vec::new()
        }
        Msg::DownloadClicked { delay_seconds } => {
            if state.download_enabled() {
                let delay_seconds = if delay_seconds == 0 {
                    DEFAULT_DELAY_SECONDS
                } else {
                    delay_seconds
                };
                state.start_run();
                state.set_status(status::STARTING);
                vec![Effect::StartWorkflow {
                    filter: state.filter_input().to_string(),
                    delay_seconds,
                }]
            } else {
                Vec::new()
            }
        }
        Msg::WorkflowStatus(message) => {
            state.set_status(message);
            Vec::new()
        }
        Msg::WorkflowFinished(outcome) => {
            if let WorkflowOutcome::Failed { reason } = &outcome {
                state.set_status(status::failed(reason));
            }
            state.finish_run();
            Vec::new()
        }
    };

    (state, effects)
}
