//! Analyst selection state and stale-response tickets

use crate::models::IncidentId;
use tokio::sync::watch;

/// Which incident the analyst is looking at, and whether its modal is open.
///
/// The modal can only be open while an incident is selected. Every selection
/// bumps `generation`, including re-selecting the same incident, so requests
/// issued for an older selection can be recognised as stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub selected_incident_id: Option<IncidentId>,
    pub modal_open: bool,
    generation: u64,
}

impl SelectionState {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn select(&mut self, incident: IncidentId) -> u64 {
        self.selected_incident_id = Some(incident);
        self.modal_open = true;
        self.generation += 1;
        self.generation
    }

    /// Returns whether anything changed
    pub(crate) fn close_modal(&mut self) -> bool {
        std::mem::replace(&mut self.modal_open, false)
    }

    pub(crate) fn clear(&mut self) -> u64 {
        self.selected_incident_id = None;
        self.modal_open = false;
        self.generation += 1;
        self.generation
    }
}

/// The selection a request was issued for.
///
/// Components receive a ticket instead of the selection itself: they can read
/// the incident id and check whether the selection has moved on, but cannot
/// change it.
#[derive(Debug, Clone)]
pub struct SelectionTicket {
    incident: IncidentId,
    generation: u64,
    watcher: watch::Receiver<SelectionState>,
}

impl SelectionTicket {
    pub(crate) fn new(
        incident: IncidentId,
        generation: u64,
        watcher: watch::Receiver<SelectionState>,
    ) -> Self {
        Self { incident, generation, watcher }
    }

    /// Ticket for whatever is selected right now
    pub(crate) fn capture(watcher: watch::Receiver<SelectionState>) -> Option<Self> {
        let (incident, generation) = {
            let state = watcher.borrow();
            (state.selected_incident_id.clone()?, state.generation)
        };
        Some(Self::new(incident, generation, watcher))
    }

    pub fn incident(&self) -> &IncidentId {
        &self.incident
    }

    /// Whether the selection is still the one this ticket was issued for
    pub fn is_current(&self) -> bool {
        let state = self.watcher.borrow();
        state.generation == self.generation
            && state.selected_incident_id.as_ref() == Some(&self.incident)
    }

    /// Whether the ticket's incident is still the selected one, even if it
    /// has been re-selected since
    pub fn is_same_incident(&self) -> bool {
        self.watcher.borrow().selected_incident_id.as_ref() == Some(&self.incident)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::select;
    use super::*;
    use crate::state::StateCell;

    #[test]
    fn test_select_opens_modal() {
        let mut state = SelectionState::default();
        assert!(!state.modal_open);

        let generation = state.select(IncidentId::new("INC-1"));
        assert_eq!(generation, 1);
        assert!(state.modal_open);
        assert_eq!(state.selected_incident_id, Some(IncidentId::new("INC-1")));

        assert!(state.close_modal());
        assert!(!state.close_modal());
        assert_eq!(state.selected_incident_id, Some(IncidentId::new("INC-1")));
    }

    #[test]
    fn test_ticket_goes_stale_on_new_selection() {
        let cell = StateCell::new(SelectionState::default());
        assert!(SelectionTicket::capture(cell.subscribe()).is_none());

        let first = select(&cell, "A");
        assert!(first.is_current());

        let second = select(&cell, "B");
        assert!(!first.is_current());
        assert!(second.is_current());
    }

    #[test]
    fn test_reselecting_same_incident_invalidates_old_ticket() {
        let cell = StateCell::new(SelectionState::default());
        let first = select(&cell, "A");
        let second = select(&cell, "A");
        assert!(!first.is_current());
        assert!(first.is_same_incident());
        assert!(second.is_current());

        select(&cell, "B");
        assert!(!first.is_same_incident());
    }

    #[test]
    fn test_closing_modal_keeps_ticket_current() {
        let cell = StateCell::new(SelectionState::default());
        let ticket = select(&cell, "A");
        cell.update(|s| s.close_modal());
        assert!(ticket.is_current());

        cell.update(|s| s.clear());
        assert!(!ticket.is_current());
    }
}
