use serde_json::{Value, json};

/// Characters of plain text kept when the webhook reports the message body
/// over its size limit.
pub(crate) const TEXT_TRUNCATE_CHARS: usize = 10_000;

/// Users to mention in a markdown message. `isAtAll` is always sent as
/// false; mentioning the whole group is not supported here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mentions {
    pub mobiles: Vec<String>,
    pub user_ids: Vec<String>,
}

/// Button layout on an action card: 0 = vertical, 1 = horizontal on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonOrientation {
    Vertical,
    Horizontal,
}

impl ButtonOrientation {
    fn code(self) -> &'static str {
        match self {
            ButtonOrientation::Vertical => "0",
            ButtonOrientation::Horizontal => "1",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardButton {
    pub title: String,
    pub action_url: String,
}

impl CardButton {
    pub fn new(title: impl Into<String>, action_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            action_url: action_url.into(),
        }
    }
}

/// One outbound webhook message. Built fresh per send; the only mutation is
/// [`Payload::shrink`], applied between delivery attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text {
        content: String,
    },
    Markdown {
        title: String,
        text: String,
        mentions: Mentions,
    },
    ActionCard {
        title: String,
        text: String,
        orientation: ButtonOrientation,
        buttons: Vec<CardButton>,
    },
}

impl Payload {
    pub fn text(content: impl Into<String>) -> Self {
        Payload::Text {
            content: content.into(),
        }
    }

    pub fn markdown(title: impl Into<String>, text: impl Into<String>, mentions: Mentions) -> Self {
        Payload::Markdown {
            title: title.into(),
            text: text.into(),
            mentions,
        }
    }

    pub fn action_card(
        title: impl Into<String>,
        text: impl Into<String>,
        buttons: Vec<CardButton>,
        orientation: ButtonOrientation,
    ) -> Self {
        Payload::ActionCard {
            title: title.into(),
            text: text.into(),
            orientation,
            buttons,
        }
    }

    /// Wire shape expected by the DingTalk robot API.
    pub fn to_json(&self) -> Value {
        match self {
            Payload::Text { content } => json!({
                "msgtype": "text",
                "text": { "content": content },
            }),
            Payload::Markdown {
                title,
                text,
                mentions,
            } => json!({
                "msgtype": "markdown",
                "markdown": { "title": title, "text": text },
                "at": {
                    "atMobiles": mentions.mobiles,
                    "atUserIds": mentions.user_ids,
                    "isAtAll": false,
                },
            }),
            Payload::ActionCard {
                title,
                text,
                orientation,
                buttons,
            } => json!({
                "msgtype": "actionCard",
                "actionCard": {
                    "title": title,
                    "text": text,
                    "btnOrientation": orientation.code(),
                    "btns": buttons
                        .iter()
                        .map(|b| json!({ "title": b.title, "actionURL": b.action_url }))
                        .collect::<Vec<_>>(),
                },
            }),
        }
    }

    /// Shrink oversized content in place before a retry. Text keeps its first
    /// 10 000 characters plus an ellipsis; markdown keeps only its title.
    /// Action cards are left as they are.
    pub fn shrink(&mut self) {
        match self {
            Payload::Text { content } => {
                let mut truncated: String = content.chars().take(TEXT_TRUNCATE_CHARS).collect();
                truncated.push('…');
                *content = truncated;
            }
            Payload::Markdown { title, text, .. } => {
                *text = format!("{title} \n\n content too long, not shown");
            }
            Payload::ActionCard { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_payload_wire_shape() {
        let payload = Payload::text("balance is fine");
        let json = payload.to_json();
        assert_eq!(json["msgtype"], "text");
        assert_eq!(json["text"]["content"], "balance is fine");
    }

    #[test]
    fn markdown_payload_carries_mentions_but_never_at_all() {
        let mentions = Mentions {
            mobiles: vec!["13800000000".into()],
            user_ids: vec!["user01".into()],
        };
        let json = Payload::markdown("Balance", "**low**", mentions).to_json();
        assert_eq!(json["msgtype"], "markdown");
        assert_eq!(json["markdown"]["title"], "Balance");
        assert_eq!(json["at"]["atMobiles"][0], "13800000000");
        assert_eq!(json["at"]["atUserIds"][0], "user01");
        assert_eq!(json["at"]["isAtAll"], false);
    }

    #[test]
    fn action_card_wire_shape_and_orientation_codes() {
        let buttons = vec![CardButton::new("Top up", "dingtalk://dingtalkclient/page/link?url=x")];
        let json =
            Payload::action_card("Balance", "body", buttons, ButtonOrientation::Vertical).to_json();
        assert_eq!(json["msgtype"], "actionCard");
        assert_eq!(json["actionCard"]["btnOrientation"], "0");
        assert_eq!(json["actionCard"]["btns"][0]["title"], "Top up");
        assert_eq!(
            json["actionCard"]["btns"][0]["actionURL"],
            "dingtalk://dingtalkclient/page/link?url=x"
        );

        let json =
            Payload::action_card("Balance", "body", Vec::new(), ButtonOrientation::Horizontal)
                .to_json();
        assert_eq!(json["actionCard"]["btnOrientation"], "1");
    }

    #[test]
    fn shrink_truncates_text_to_limit_plus_ellipsis() {
        let mut payload = Payload::text("x".repeat(50_000));
        payload.shrink();
        let Payload::Text { content } = &payload else {
            panic!("variant changed by shrink");
        };
        assert_eq!(content.chars().count(), TEXT_TRUNCATE_CHARS + 1);
        assert!(content.ends_with('…'));
    }

    #[test]
    fn shrink_replaces_markdown_body_and_keeps_title() {
        let mut payload = Payload::markdown("Balance", "y".repeat(50_000), Mentions::default());
        payload.shrink();
        let Payload::Markdown { title, text, .. } = &payload else {
            panic!("variant changed by shrink");
        };
        assert_eq!(title, "Balance");
        assert!(text.contains("Balance"));
        assert!(text.contains("content too long"));
        assert!(!text.contains("yyyy"));
    }

    #[test]
    fn shrink_leaves_action_cards_untouched() {
        let mut payload = Payload::action_card(
            "Balance",
            "z".repeat(50_000),
            Vec::new(),
            ButtonOrientation::Vertical,
        );
        let before = payload.clone();
        payload.shrink();
        assert_eq!(payload, before);
    }

    #[test]
    fn shrink_respects_char_boundaries() {
        let mut payload = Payload::text("额".repeat(20_000));
        payload.shrink();
        let Payload::Text { content } = &payload else {
            panic!("variant changed by shrink");
        };
        assert_eq!(content.chars().count(), TEXT_TRUNCATE_CHARS + 1);
    }
}
