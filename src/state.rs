// UI-facing state machines for load, upload and feedback status.
//
// Each of these is assigned wholesale by a view-layer controller; variants
// are snapshots, never mutated in place.
use std::time::Duration;

/// Generic state for data loading operations.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
    Idle,
    Loading,
    Loaded(T),
    Error(String),
}

// Derived Default would bound T: Default; Idle needs no T.
impl<T> Default for LoadState<T> {
    fn default() -> Self {
        LoadState::Idle
    }
}

impl<T> LoadState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadState::Loaded(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            LoadState::Loaded(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// State for file upload operations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    None,
    Uploading {
        active: usize,
        total: usize,
    },
    Error {
        message: String,
        can_retry: bool,
    },
    Success {
        message: String,
    },
}

impl UploadState {
    pub fn is_uploading(&self) -> bool {
        matches!(self, UploadState::Uploading { .. })
    }

    pub fn show_error(&self) -> bool {
        matches!(self, UploadState::Error { .. })
    }

    pub fn show_success(&self) -> bool {
        matches!(self, UploadState::Success { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            UploadState::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn can_retry(&self) -> bool {
        matches!(self, UploadState::Error { can_retry: true, .. })
    }

    pub fn success_message(&self) -> Option<&str> {
        match self {
            UploadState::Success { message } => Some(message),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<(usize, usize)> {
        match self {
            UploadState::Uploading { active, total } => Some((*active, *total)),
            _ => None,
        }
    }
}

/// Which transient message or dialog is currently shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedbackState {
    #[default]
    None,
    Error(ErrorBanner),
    Success(SuccessBanner),
    Dialog(CustomDialog),
}

impl FeedbackState {
    pub fn show_error(&self) -> bool {
        matches!(self, FeedbackState::Error(_))
    }

    pub fn show_success(&self) -> bool {
        matches!(self, FeedbackState::Success(_))
    }

    pub fn show_dialog(&self) -> bool {
        matches!(self, FeedbackState::Dialog(_))
    }

    pub fn error_banner(&self) -> Option<&ErrorBanner> {
        match self {
            FeedbackState::Error(banner) => Some(banner),
            _ => None,
        }
    }

    pub fn success_banner(&self) -> Option<&SuccessBanner> {
        match self {
            FeedbackState::Success(banner) => Some(banner),
            _ => None,
        }
    }

    pub fn dialog(&self) -> Option<&CustomDialog> {
        match self {
            FeedbackState::Dialog(dialog) => Some(dialog),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBanner {
    pub message: String,
    pub action_title: Option<String>,
}

impl ErrorBanner {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            action_title: None,
        }
    }

    pub fn with_action(message: impl Into<String>, action_title: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            action_title: Some(action_title.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessBanner {
    pub message: String,
    pub duration: Duration,
}

impl SuccessBanner {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            duration: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomDialog {
    pub title: String,
    pub message: String,
    pub buttons: Vec<DialogButton>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogButton {
    pub title: String,
    pub role: ButtonRole,
}

impl DialogButton {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            role: ButtonRole::Normal,
        }
    }

    pub fn with_role(title: impl Into<String>, role: ButtonRole) -> Self {
        Self {
            title: title.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonRole {
    #[default]
    Normal,
    Cancel,
    Destructive,
}
