/// User intents produced from key events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Quit the application
    Quit,

    /// Pause or resume sampling
    TogglePause,

    /// Focus the next panel
    FocusNext,

    /// Focus the previous panel
    FocusPrev,

    /// Select the next series in the focused panel
    SelectNext,

    /// Select the previous series in the focused panel
    SelectPrev,

    /// Redraw without sampling
    Redraw,
}
