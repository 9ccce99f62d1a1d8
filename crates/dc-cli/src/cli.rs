//! CLI (Command Line Interface) mode
//!
//! Interactive REPL over the chat engine: sessions, document uploads and
//! streamed replies.

use std::borrow::Cow;
use std::io::Write;
use std::path::PathBuf;

use dc_core::attachments::validate_files;
use dc_core::{ChatEngine, ChatEvent, Message, PendingAttachment, Role, SendOutcome, Session, Uploader};
use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, Completer, DefaultHinter, Emacs, KeyCode, KeyModifiers, Keybindings,
    MenuBuilder, Prompt, Reedline, ReedlineEvent, ReedlineMenu, Signal, Suggestion,
};
use tokio::sync::broadcast;
use tracing::info;

/// Available commands for autocomplete display
const COMMANDS: &[(&str, &str)] = &[
    ("/help", "ヘルプを表示"),
    ("/exit", "プログラムを終了"),
    ("/quit", "プログラムを終了"),
    ("/new", "新しいチャットを開始"),
    ("/sessions", "セッション一覧を表示"),
    ("/switch", "セッションを切り替え (番号または ID)"),
    ("/delete", "セッションを削除 (番号または ID)"),
    ("/rename", "現在のセッション名を変更"),
    ("/upload", "ファイルをアップロードして次のメッセージに添付"),
    ("/open", "ファイルをアップロードして新しいセッションを開始"),
    ("/pending", "添付待ちのファイルを表示"),
    ("/detach", "添付待ちのファイルを外す (番号)"),
    ("/history", "会話履歴を表示"),
];

const PREVIEW_CHARS: usize = 100;

/// Command completer for reedline
#[derive(Clone)]
pub struct CommandCompleter {
    commands: Vec<(&'static str, &'static str)>,
}

impl CommandCompleter {
    pub fn new() -> Self {
        Self {
            commands: COMMANDS.to_vec(),
        }
    }
}

impl Default for CommandCompleter {
    fn default() -> Self {
        Self::new()
    }
}

impl Completer for CommandCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        // 引数の入力中は補完しない
        if !line.starts_with('/') || line.contains(' ') {
            return Vec::new();
        }

        self.commands
            .iter()
            .filter(|(cmd, _)| cmd.starts_with(line))
            .map(|(cmd, desc)| Suggestion {
                value: cmd.to_string(),
                description: Some(desc.to_string()),
                extra: None,
                span: reedline::Span::new(0, pos),
                append_whitespace: true,
                style: None,
            })
            .collect()
    }
}

/// Prompt showing the active session title
struct ColoredPrompt {
    label: String,
    style: Style,
}

impl ColoredPrompt {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            style: Color::Cyan.bold(),
        }
    }
}

impl Prompt for ColoredPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Owned(self.style.paint(format!("[{}] > ", self.label)).to_string())
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: reedline::PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_history_search_indicator(
        &self,
        _history_search: reedline::PromptHistorySearch,
    ) -> Cow<'_, str> {
        Cow::Borrowed("")
    }
}

/// Result of handling one input line
enum Flow {
    Continue,
    Exit,
}

/// Run CLI interactive mode
pub async fn run_cli(engine: ChatEngine, uploader: Uploader) -> anyhow::Result<()> {
    info!("Starting CLI with {} sessions", engine.sessions().await.len());

    print_welcome();

    let mut keybindings = default_keybindings();

    // Trigger completion on '/' key
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Char('/'),
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );

    let menu = Box::new(
        ColumnarMenu::default()
            .with_name("command_menu")
            .with_columns(1)
            .with_column_width(Some(50))
            .with_only_buffer_difference(false),
    );

    let hinter = DefaultHinter::default().with_style(Style::new().dimmed());

    let mut line_editor = Reedline::create()
        .with_completer(Box::new(CommandCompleter::new()))
        .with_menu(ReedlineMenu::EngineCompleter(menu))
        .with_hinter(Box::new(hinter))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    loop {
        let prompt = ColoredPrompt::new(prompt_label(&engine).await);

        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                if input.starts_with('/') {
                    if let Flow::Exit = handle_command(input, &engine, &uploader).await {
                        println!("\n👋 さようなら！\n");
                        break;
                    }
                    continue;
                }

                send_and_stream(&engine, input).await;
            }
            Ok(Signal::CtrlC) => {
                println!("^C");
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("\n👋 さようなら！\n");
                break;
            }
            Err(err) => {
                eprintln!("\n❌ エラー: {}\n", err);
                break;
            }
        }
    }

    Ok(())
}

/// Default keybindings for reedline
fn default_keybindings() -> Keybindings {
    let mut keybindings = Keybindings::new();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Enter, ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Esc, ReedlineEvent::Esc);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('c'), ReedlineEvent::CtrlC);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('d'), ReedlineEvent::CtrlD);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Up, ReedlineEvent::Up);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Down, ReedlineEvent::Down);
    keybindings
}

async fn prompt_label(engine: &ChatEngine) -> String {
    let Some(id) = engine.active_session_id().await else {
        return "new".to_string();
    };
    engine
        .sessions()
        .await
        .into_iter()
        .find(|s| s.id == id)
        .map(|s| s.title)
        .unwrap_or_else(|| "new".to_string())
}

/// Handle slash commands
async fn handle_command(input: &str, engine: &ChatEngine, uploader: &Uploader) -> Flow {
    let (command, args) = match input.split_once(char::is_whitespace) {
        Some((command, args)) => (command.to_lowercase(), args.trim()),
        None => (input.to_lowercase(), ""),
    };

    match command.as_str() {
        "/exit" | "/quit" | "/q" => return Flow::Exit,
        "/help" | "/?" => print_help(),
        "/new" => match engine.new_chat().await {
            Ok(()) => println!("\n✅ 新しいチャットを開始しました。\n"),
            Err(e) => eprintln!("\n❌ エラー: {}\n", e),
        },
        "/sessions" => {
            let active = engine.active_session_id().await;
            print_sessions(&engine.sessions().await, active.as_deref());
        }
        "/switch" => {
            let Some(id) = require_session(engine, args).await else {
                return Flow::Continue;
            };
            match engine.select(Some(&id)).await {
                Ok(()) => print_history(&engine.history().await),
                Err(e) => eprintln!("\n❌ エラー: {}\n", e),
            }
        }
        "/delete" => {
            let Some(id) = require_session(engine, args).await else {
                return Flow::Continue;
            };
            match engine.delete(&id).await {
                Ok(true) => println!("\n🗑️ セッションを削除しました。\n"),
                Ok(false) => eprintln!("\n❓ セッションが見つかりません: {}\n", id),
                Err(e) => eprintln!("\n❌ 削除を保存できませんでした: {}\n", e),
            }
        }
        "/rename" => {
            if args.is_empty() {
                eprintln!("\n使い方: /rename <タイトル>\n");
                return Flow::Continue;
            }
            let Some(id) = engine.active_session_id().await else {
                eprintln!("\n❓ アクティブなセッションがありません。\n");
                return Flow::Continue;
            };
            match engine.rename(&id, args).await {
                Ok(_) => println!("\n✅ タイトルを「{}」に変更しました。\n", args),
                Err(e) => eprintln!("\n❌ エラー: {}\n", e),
            }
        }
        "/upload" => {
            if let Some(attachments) = upload_paths(uploader, args).await {
                let names: Vec<String> =
                    attachments.iter().map(|a| a.display_name.clone()).collect();
                engine.add_pending(attachments).await;
                println!("\n📎 次のメッセージに添付します: {}\n", names.join(", "));
            }
        }
        "/open" => {
            if let Some(attachments) = upload_paths(uploader, args).await {
                match engine.open_document(attachments).await {
                    Ok(session) => println!("\n📄 新しいセッション「{}」を開始しました。\n", session.title),
                    Err(e) => eprintln!("\n❌ エラー: {}\n", e),
                }
            }
        }
        "/pending" => print_pending(&engine.pending().await.iter().cloned().collect::<Vec<_>>()),
        "/detach" => {
            let pending: Vec<PendingAttachment> = engine.pending().await.iter().cloned().collect();
            match args.parse::<usize>().ok().and_then(|n| n.checked_sub(1)).and_then(|i| pending.get(i)) {
                Some(attachment) => {
                    engine.remove_pending(attachment.uri()).await;
                    println!("\n✅ {} を外しました。\n", attachment.display_name);
                }
                None => eprintln!("\n使い方: /detach <番号> (/pending で確認)\n"),
            }
        }
        "/history" => print_history(&engine.history().await),
        _ => eprintln!(
            "\n❓ 不明なコマンド: {}。/help でコマンド一覧を確認してください。\n",
            input
        ),
    }

    Flow::Continue
}

/// Send a message and print reply fragments as they arrive
async fn send_and_stream(engine: &ChatEngine, text: &str) {
    let mut events = engine.subscribe();
    let send = engine.send_message(text);
    tokio::pin!(send);

    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome,
            Ok(event) = events.recv() => print_event(&event),
        }
    };

    // events sent just before completion
    loop {
        match events.try_recv() {
            Ok(event) => print_event(&event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    match outcome {
        Ok(SendOutcome::Committed { .. }) => println!("\n"),
        Ok(SendOutcome::Failed { error }) => {
            eprintln!("\n❌ エラー: {}", error);
            eprintln!("   会話は保存されていません。もう一度送信できます。\n");
        }
        Ok(SendOutcome::Skipped) => {}
        Err(e) => eprintln!("\n❌ エラー: {}\n", e),
    }
}

fn print_event(event: &ChatEvent) {
    match event {
        ChatEvent::Started { .. } => print!("\n🤖 "),
        ChatEvent::Delta { text, .. } => print!("{}", text),
        ChatEvent::Finished { .. } | ChatEvent::Failed { .. } => {}
    }
    std::io::stdout().flush().ok();
}

/// Validate and upload the files named in `args`.
/// Prints a single error line and returns `None` if nothing could be uploaded.
async fn upload_paths(uploader: &Uploader, args: &str) -> Option<Vec<PendingAttachment>> {
    let paths: Vec<PathBuf> = args.split_whitespace().map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("\n使い方: /upload <ファイル...> または /open <ファイル...>\n");
        return None;
    }

    let validation = validate_files(&paths).await;
    if let Some(err) = validation.rejection() {
        eprintln!("\n⚠️ {}", err);
    }
    if validation.accepted.is_empty() {
        return None;
    }

    println!("\n📤 {} 件のファイルをアップロード中...", validation.accepted.len());
    match uploader.upload_all(&validation.accepted).await {
        Ok(attachments) => Some(attachments),
        Err(e) => {
            eprintln!("\n❌ アップロードに失敗しました: {}\n", e);
            None
        }
    }
}

/// Resolve `/switch` and `/delete` arguments, printing usage on failure
async fn require_session(engine: &ChatEngine, arg: &str) -> Option<String> {
    if arg.is_empty() {
        eprintln!("\n使い方: /switch <番号|ID> または /delete <番号|ID>\n");
        return None;
    }
    let found = resolve_session(&engine.sessions().await, arg);
    if found.is_none() {
        eprintln!("\n❓ セッションが見つかりません: {}\n", arg);
    }
    found
}

/// Find a session by 1-based list position, id or unique id prefix
fn resolve_session(sessions: &[Session], arg: &str) -> Option<String> {
    if let Ok(n) = arg.parse::<usize>() {
        if let Some(session) = n.checked_sub(1).and_then(|i| sessions.get(i)) {
            return Some(session.id.clone());
        }
    }

    if let Some(session) = sessions.iter().find(|s| s.id == arg) {
        return Some(session.id.clone());
    }

    let mut matches = sessions.iter().filter(|s| s.id.starts_with(arg));
    match (matches.next(), matches.next()) {
        (Some(session), None) => Some(session.id.clone()),
        _ => None,
    }
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() > PREVIEW_CHARS {
        format!("{}...", flat.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        flat
    }
}

/// Print welcome message
fn print_welcome() {
    println!();
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║          📄 docchat - ドキュメントと対話                    ║");
    println!("╠════════════════════════════════════════════════════════════╣");
    println!("║  メッセージを入力して Enter でチャット開始                  ║");
    println!("║  /open <ファイル> で PDF / TXT を開いて新しいセッションへ   ║");
    println!("║  / を入力するとコマンド候補が表示されます                   ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
}

/// Print help message
fn print_help() {
    println!();
    println!("📖 利用可能なコマンド:");
    for (cmd, desc) in COMMANDS {
        println!("  {} - {}", cmd, desc);
    }
    println!();
    println!("💡 ヒント: 対応ファイルは .pdf と .txt です");
    println!("💡 /upload で添付したファイルは次のメッセージ送信で使われます");
    println!();
}

fn print_sessions(sessions: &[Session], active: Option<&str>) {
    println!();
    if sessions.is_empty() {
        println!("📂 セッションはまだありません。");
        println!();
        return;
    }

    println!("📂 セッション ({} 件):", sessions.len());
    println!("{}", "─".repeat(50));
    for (i, session) in sessions.iter().enumerate() {
        let marker = if Some(session.id.as_str()) == active { "▶" } else { " " };
        println!(
            "{} {}. {} ({} 件, {}) [{}]",
            marker,
            i + 1,
            session.title,
            session.message_count(),
            session.updated_at.format("%Y-%m-%d %H:%M"),
            &session.id[..8.min(session.id.len())],
        );
    }
    println!("{}", "─".repeat(50));
    println!();
}

fn print_pending(pending: &[PendingAttachment]) {
    println!();
    if pending.is_empty() {
        println!("📎 添付待ちのファイルはありません。");
    } else {
        println!("📎 添付待ち ({} 件):", pending.len());
        for (i, attachment) in pending.iter().enumerate() {
            println!("  {}. {} ({})", i + 1, attachment.display_name, attachment.file.mime_type);
        }
    }
    println!();
}

/// Print conversation history
fn print_history(messages: &[Message]) {
    println!();
    println!("📜 会話履歴 ({} 件):", messages.len());
    println!("{}", "─".repeat(50));

    for (i, msg) in messages.iter().enumerate() {
        let role = match msg.role {
            Role::User => "👤 あなた",
            Role::Model => "🤖 AI",
        };
        println!("{}. {}: {}", i + 1, role, preview(&msg.text()));
        if let Some(names) = &msg.file_names {
            println!("   📎 {}", names.join(", "));
        }
    }

    println!("{}", "─".repeat(50));
    println!();
}
