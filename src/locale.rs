
/// Language of the user-visible session texts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    Ja,
    En,
}

impl Locale {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ja" | "ja-jp" | "ja_jp" | "japanese" => Some(Locale::Ja),
            "en" | "en-us" | "en_us" | "english" => Some(Locale::En),
            _ => None,
        }
    }

    /// No token is available before a request is made.
    pub fn login_required(self) -> &'static str {
        match self {
            Locale::Ja => "ログインが必要です",
            Locale::En => "Please log in to continue.",
        }
    }

    /// The server rejected the token.
    pub fn auth_required(self) -> &'static str {
        match self {
            Locale::Ja => "認証が必要です。再度ログインしてください。",
            Locale::En => "Your session has expired. Please log in again.",
        }
    }

    pub fn send_failed(self) -> &'static str {
        match self {
            Locale::Ja => "メッセージの送信に失敗しました",
            Locale::En => "Failed to send the message.",
        }
    }

    pub fn history_load_failed(self) -> &'static str {
        match self {
            Locale::Ja => "チャット履歴の読み込みに失敗しました",
            Locale::En => "Failed to load the chat history.",
        }
    }

    pub fn clear_failed(self) -> &'static str {
        match self {
            Locale::Ja => "チャット履歴のクリアに失敗しました",
            Locale::En => "Failed to clear the chat history.",
        }
    }

    /// Assistant reply appended when a turn fails.
    pub fn fallback_reply(self) -> &'static str {
        match self {
            Locale::Ja => "申し訳ありません。エラーが発生しました。もう一度お試しください。",
            Locale::En => "Sorry, something went wrong. Please try again.",
        }
    }
}
