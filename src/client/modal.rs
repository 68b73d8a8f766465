use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SHOW_MODAL: &str = "SHOW_MODAL";
pub const HIDE_MODAL: &str = "HIDE_MODAL";

/// Action descriptor consumed by the modal reducer, serialized as
/// `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ModalAction {
    #[serde(rename = "SHOW_MODAL")]
    Show { props: Value, component: String },
    /// Carries the name of the component whose modal closes.
    #[serde(rename = "HIDE_MODAL")]
    Hide(String),
}

impl ModalAction {
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::Show { .. } => SHOW_MODAL,
            Self::Hide(_) => HIDE_MODAL,
        }
    }
}

/// Shows the modal rendering `component` with `props`.
pub fn show_modal(props: Value, component: impl Into<String>) -> ModalAction {
    ModalAction::Show {
        props,
        component: component.into(),
    }
}

pub fn hide_modal(component: impl Into<String>) -> ModalAction {
    ModalAction::Hide(component.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn show_modal_wire_shape() {
        let action = show_modal(json!({ "postId": "p1" }), "PostDialog");
        assert_eq!(action.action_type(), SHOW_MODAL);
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({
                "type": "SHOW_MODAL",
                "payload": { "props": { "postId": "p1" }, "component": "PostDialog" }
            })
        );
    }

    #[test]
    fn hide_modal_wire_shape() {
        let action = hide_modal("OptionsDialog");
        assert_eq!(action.action_type(), HIDE_MODAL);
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({ "type": "HIDE_MODAL", "payload": "OptionsDialog" })
        );

        let parsed: ModalAction =
            serde_json::from_value(json!({ "type": "HIDE_MODAL", "payload": "OptionsDialog" })).unwrap();
        assert_eq!(parsed, action);
    }
}
