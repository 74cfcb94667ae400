use std::{
    env, fs,
    io::{self},
    ops::Range,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{error, info, warn};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

use markpane::{
    assistant::{Assistant, AssistantAction, AssistantRequest, resolve_selection},
    buffer::TextBuffer,
    config::{self, Config},
    export,
    render::{PassOutcome, RenderPipeline},
    stats,
    store::{DirectoryStore, DocumentStore, StoreError},
    theme::{Theme, ThemePreference},
};

const STATUS_TIMEOUT: Duration = Duration::from_secs(4);
const LOG_FILE: &str = "markpane.log";
const DEFAULT_FILE_NAME: &str = "Untitled.md";
const PROCESSING: &str = "Processing...";

fn main() -> Result<()> {
    run()
}

fn run() -> Result<()> {
    dotenvy::dotenv().ok();

    let config_path = config::config_file().context("failed to locate config directory")?;
    let config = Config::load(&config_path)?;
    let data_dir = config.data_dir()?;
    init_logging(&data_dir)?;
    info!("config {}, data {}", config_path.display(), data_dir.display());

    let backend = DirectoryStore::open(&data_dir)
        .with_context(|| format!("failed to open data directory {}", data_dir.display()))?;
    let mut store = DocumentStore::new(backend, RenderPipeline::from_config(&config.render));
    store.restore().context("failed to restore documents")?;

    let mut initial_status = None;
    if let Some(path_arg) = env::args().nth(1) {
        let path = PathBuf::from(path_arg);
        initial_status = Some(import_file(&mut store, &path)?);
    }

    let assistant = Assistant::from_config(&config.assistant);
    let autosave_interval = Duration::from_secs(config.autosave_interval_secs.max(1));
    let mut app = App::new(store, assistant, autosave_interval, initial_status)?;

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to initialize terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().ok();

    let res = run_app(&mut terminal, &mut app).context("application error");

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    res
}

fn init_logging(data_dir: &Path) -> Result<()> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    let log_path = data_dir.join(LOG_FILE);
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn import_file(store: &mut DocumentStore, path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    store.import(&content)?;
    let name = export::import_name(path);
    store.create(&name)?;
    Ok(format!("Imported {name}"))
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();
    let mut needs_redraw = true;

    while !app.should_quit() {
        if needs_redraw {
            terminal
                .draw(|frame| app.draw(frame))
                .context("failed to draw frame")?;
            needs_redraw = false;
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout).context("event poll failed")? {
            let evt = event::read().context("failed to read event")?;
            app.handle_event(evt);
            needs_redraw = true;
        }

        if last_tick.elapsed() >= tick_rate {
            if app.on_tick() {
                needs_redraw = true;
            }
            last_tick = Instant::now();
        }
    }

    app.autosave();
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pane {
    Markdown,
    Plain,
    Html,
}

impl Pane {
    const ALL: [Pane; 3] = [Pane::Markdown, Pane::Plain, Pane::Html];

    fn index(self) -> usize {
        match self {
            Pane::Markdown => 0,
            Pane::Plain => 1,
            Pane::Html => 2,
        }
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn title(self) -> &'static str {
        match self {
            Pane::Markdown => "Markdown",
            Pane::Plain => "Plain text (edits are read as Markdown)",
            Pane::Html => "HTML",
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct PaneScroll {
    top: usize,
    left: usize,
}

impl PaneScroll {
    fn follow(&mut self, line: usize, column: usize, height: usize, width: usize) {
        let height = height.max(1);
        let width = width.max(1);
        if line < self.top {
            self.top = line;
        } else if line >= self.top + height {
            self.top = line + 1 - height;
        }
        if column < self.left {
            self.left = column;
        } else if column >= self.left + width {
            self.left = column + 1 - width;
        }
    }
}

struct FileListState {
    entries: Vec<(String, String)>,
    selected: usize,
}

impl FileListState {
    fn move_selection(&mut self, delta: i32) {
        if self.entries.is_empty() {
            return;
        }
        let len = self.entries.len() as i32;
        self.selected = (self.selected as i32 + delta).rem_euclid(len) as usize;
    }

    fn current(&self) -> Option<&(String, String)> {
        self.entries.get(self.selected)
    }
}

struct AssistantPanel {
    action: AssistantAction,
    instruction: String,
    selection: String,
    output: String,
    pending: Option<Receiver<String>>,
}

impl AssistantPanel {
    fn new() -> Self {
        Self {
            action: AssistantAction::Summarize,
            instruction: String::new(),
            selection: String::new(),
            output: String::new(),
            pending: None,
        }
    }
}

enum Overlay {
    NamePrompt { input: String },
    FileList(FileListState),
    ConfirmDelete { id: String, name: String },
    ConfirmClearAll,
    ConfirmOverwrite { existing: Vec<String> },
    Assistant,
}

struct App {
    store: DocumentStore,
    assistant: Assistant,
    panel: AssistantPanel,
    theme_preference: ThemePreference,
    theme: Theme,
    markdown: TextBuffer,
    plain: TextBuffer,
    focus: Pane,
    scroll: [PaneScroll; 3],
    overlay: Option<Overlay>,
    should_quit: bool,
    status_message: Option<(String, Instant)>,
    autosave_interval: Duration,
    last_autosave: Instant,
    autosaved_at: Option<DateTime<Local>>,
    export_dir: PathBuf,
}

impl App {
    fn new(
        store: DocumentStore,
        assistant: Assistant,
        autosave_interval: Duration,
        initial_status: Option<String>,
    ) -> Result<Self> {
        let theme_preference = store.theme()?;
        let markdown = TextBuffer::new(store.document().markdown_source());
        let plain = TextBuffer::new(store.document().plain_projection());
        Ok(Self {
            store,
            assistant,
            panel: AssistantPanel::new(),
            theme_preference,
            theme: theme_preference.theme(),
            markdown,
            plain,
            focus: Pane::Markdown,
            scroll: [PaneScroll::default(); 3],
            overlay: None,
            should_quit: false,
            status_message: initial_status.map(|msg| (msg, Instant::now())),
            autosave_interval,
            last_autosave: Instant::now(),
            autosaved_at: None,
            export_dir: PathBuf::from("."),
        })
    }

    fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    fn report(&mut self, err: StoreError) {
        error!("{err}");
        self.set_status(format!("Error: {err}"));
    }

    /// Returns whether anything visible changed.
    fn on_tick(&mut self) -> bool {
        let mut changed = self.poll_assistant();
        if self.last_autosave.elapsed() >= self.autosave_interval {
            self.autosave();
            changed = true;
        }
        if let Some((_, instant)) = &self.status_message
            && instant.elapsed() > STATUS_TIMEOUT
        {
            self.status_message = None;
            changed = true;
        }
        changed
    }

    fn autosave(&mut self) {
        self.last_autosave = Instant::now();
        match self.store.autosave_tick() {
            Ok(()) => self.autosaved_at = Some(Local::now()),
            Err(err) => self.report(err),
        }
    }

    fn is_dirty(&self) -> bool {
        let source = self.store.document().markdown_source();
        match self.store.active_record() {
            Some(record) => record.content != source,
            None => !source.is_empty(),
        }
    }

    fn markdown_changed(&mut self) {
        if let Err(err) = self.store.set_source(self.markdown.text()) {
            self.report(err);
        }
        self.plain.set_text(self.store.document().plain_projection());
    }

    fn plain_changed(&mut self) {
        if let Err(err) = self.store.set_plain(self.plain.text()) {
            self.report(err);
        }
        self.markdown
            .set_text(self.store.document().markdown_source());
    }

    /// Reloads both editors from the store after it replaced the buffer.
    fn reload_buffers(&mut self) {
        let document = self.store.document();
        self.markdown = TextBuffer::new(document.markdown_source());
        self.plain = TextBuffer::new(document.plain_projection());
        self.scroll = [PaneScroll::default(); 3];
    }

    fn set_focus(&mut self, pane: Pane) {
        if self.focus == Pane::Plain && pane != Pane::Plain {
            // The plain editor may hold text the projection would strip.
            self.plain.set_text(self.store.document().plain_projection());
        }
        self.focus = pane;
    }

    fn save(&mut self) {
        match self.store.save() {
            Ok(()) => {
                let name = self
                    .store
                    .active_record()
                    .map(|record| record.name.clone())
                    .unwrap_or_default();
                self.set_status(format!("Saved: {name}"));
            }
            Err(StoreError::NameRequired) => self.open_name_prompt(),
            Err(err) => self.report(err),
        }
    }

    fn open_name_prompt(&mut self) {
        self.overlay = Some(Overlay::NamePrompt {
            input: DEFAULT_FILE_NAME.to_string(),
        });
    }

    fn create_file(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        match self.store.create(name) {
            Ok(_) => self.set_status(format!("File created: {name}")),
            Err(err) => self.report(err),
        }
    }

    fn open_file_list(&mut self) {
        let entries = self
            .store
            .list()
            .into_iter()
            .map(|record| (record.id.clone(), record.name.clone()))
            .collect::<Vec<_>>();
        let selected = self
            .store
            .active_id()
            .and_then(|active| entries.iter().position(|(id, _)| id == active))
            .unwrap_or(0);
        self.overlay = Some(Overlay::FileList(FileListState { entries, selected }));
    }

    fn open_file(&mut self, id: &str) {
        if let Err(err) = self.store.open(id) {
            self.report(err);
            return;
        }
        self.reload_buffers();
        let name = self
            .store
            .active_record()
            .map(|record| record.name.clone())
            .unwrap_or_default();
        self.set_status(format!("Opened: {name}"));
    }

    fn delete_file(&mut self, id: &str) {
        match self.store.delete(id, true) {
            Ok(record) => self.set_status(format!("Deleted: {}", record.name)),
            Err(err) => self.report(err),
        }
    }

    fn clear_all(&mut self) {
        match self.store.clear_all(true) {
            Ok(()) => self.set_status("Cleared all saved files"),
            Err(err) => self.report(err),
        }
    }

    fn new_document(&mut self) {
        self.store.new_document();
        self.reload_buffers();
        self.set_status("New document");
    }

    fn toggle_theme(&mut self) {
        let preference = self.theme_preference.toggled();
        match self.store.set_theme(preference) {
            Ok(()) => {
                self.theme_preference = preference;
                self.theme = preference.theme();
            }
            Err(err) => self.report(err),
        }
    }

    /// Writes both export files, asking first if either already exists.
    fn export(&mut self, overwrite: bool) {
        let markdown_path = self.export_dir.join(export::MARKDOWN_FILE_NAME);
        let html_path = self.export_dir.join(export::HTML_FILE_NAME);
        if !overwrite {
            let existing: Vec<String> = [&markdown_path, &html_path]
                .into_iter()
                .filter(|path| path.exists())
                .map(|path| path.display().to_string())
                .collect();
            if !existing.is_empty() {
                self.overlay = Some(Overlay::ConfirmOverwrite { existing });
                return;
            }
        }

        let document = self.store.document();
        let markdown = export::markdown_export(document.markdown_source());
        let html = export::html_document(document.rendered_html());
        let result =
            fs::write(&markdown_path, markdown).and_then(|()| fs::write(&html_path, html));
        match result {
            Ok(()) => self.set_status(format!(
                "Exported {} and {}",
                markdown_path.display(),
                html_path.display()
            )),
            Err(err) => {
                warn!("export failed: {err}");
                self.set_status(format!("Export failed: {err}"));
            }
        }
    }

    fn open_assistant(&mut self) {
        let source = self.store.document().markdown_source();
        self.panel.selection = resolve_selection(self.markdown.selected_text(), source).to_string();
        self.overlay = Some(Overlay::Assistant);
    }

    fn run_assistant(&mut self) {
        let request = AssistantRequest::new(
            self.panel.action,
            self.panel.instruction.clone(),
            self.panel.selection.clone(),
        );
        if !self.assistant.is_remote() {
            self.panel.output = self.assistant.dispatch(&request);
            return;
        }
        // Replies are not cancelled; a late one still replaces the output.
        let (sender, receiver) = mpsc::channel();
        let assistant = self.assistant.clone();
        thread::spawn(move || {
            sender.send(assistant.dispatch(&request)).ok();
        });
        self.panel.output = PROCESSING.to_string();
        self.panel.pending = Some(receiver);
    }

    fn poll_assistant(&mut self) -> bool {
        let Some(receiver) = &self.panel.pending else {
            return false;
        };
        match receiver.try_recv() {
            Ok(reply) => {
                self.panel.output = reply;
                self.panel.pending = None;
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.panel.output = "Assistant request was lost".to_string();
                self.panel.pending = None;
                true
            }
        }
    }

    /// Returns whether the output was inserted.
    fn insert_assistant_output(&mut self) -> bool {
        if self.panel.output.is_empty() || self.panel.pending.is_some() {
            return false;
        }
        let offset = self
            .markdown
            .selection()
            .map_or(self.markdown.cursor(), |range| range.end);
        match self.store.insert_at(offset, &self.panel.output) {
            Ok(end) => {
                self.markdown
                    .set_text(self.store.document().markdown_source());
                self.markdown.set_cursor(end);
                self.plain.set_text(self.store.document().plain_projection());
                self.set_status("Inserted assistant output");
                true
            }
            Err(err) => {
                self.report(err);
                false
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = event
        else {
            return;
        };

        if self.overlay.is_some() {
            self.handle_overlay_key(code, modifiers);
            return;
        }

        match (code, modifiers) {
            (KeyCode::Char('q'), m) | (KeyCode::Char('c'), m)
                if m.contains(KeyModifiers::CONTROL) =>
            {
                self.should_quit = true;
            }
            (KeyCode::Char('s'), m) if m.contains(KeyModifiers::CONTROL) => self.save(),
            (KeyCode::Char('n'), m) if m.contains(KeyModifiers::CONTROL) => {
                self.open_name_prompt();
            }
            (KeyCode::Char('o'), m) if m.contains(KeyModifiers::CONTROL) => {
                self.open_file_list();
            }
            (KeyCode::Char('t'), m) if m.contains(KeyModifiers::CONTROL) => self.new_document(),
            (KeyCode::Char('e'), m) if m.contains(KeyModifiers::CONTROL) => self.export(false),
            (KeyCode::F(2), _) => self.open_assistant(),
            (KeyCode::F(5), _) => self.toggle_theme(),
            (KeyCode::Tab, _) => self.set_focus(self.focus.next()),
            _ => match self.focus {
                Pane::Markdown => self.handle_markdown_key(code, modifiers),
                Pane::Plain => self.handle_plain_key(code, modifiers),
                Pane::Html => self.handle_html_key(code),
            },
        }
    }

    fn handle_markdown_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if modifiers.contains(KeyModifiers::CONTROL) {
            if code == KeyCode::Char('a') {
                self.markdown.select_all();
                return;
            }
            let wrapped = match code {
                KeyCode::Char('b') => Some(("**", "**")),
                KeyCode::Char('i') => Some(("*", "*")),
                KeyCode::Char('h') => Some(("# ", "")),
                KeyCode::Char('l') => Some(("- ", "")),
                KeyCode::Char('k') => Some(("```\n", "\n```")),
                _ => None,
            };
            if let Some((before, after)) = wrapped {
                self.markdown.wrap_selection(before, after);
                self.markdown_changed();
            }
            return;
        }
        if edit_buffer(&mut self.markdown, code, modifiers) {
            self.markdown_changed();
        }
    }

    fn handle_plain_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if modifiers.contains(KeyModifiers::CONTROL) {
            if code == KeyCode::Char('a') {
                self.plain.select_all();
            }
            return;
        }
        if edit_buffer(&mut self.plain, code, modifiers) {
            self.plain_changed();
        }
    }

    fn handle_html_key(&mut self, code: KeyCode) {
        let scroll = &mut self.scroll[Pane::Html.index()];
        match code {
            KeyCode::Up => scroll.top = scroll.top.saturating_sub(1),
            KeyCode::Down => scroll.top += 1,
            KeyCode::PageUp => scroll.top = scroll.top.saturating_sub(20),
            KeyCode::PageDown => scroll.top += 20,
            KeyCode::Home => scroll.top = 0,
            _ => {}
        }
    }

    fn handle_overlay_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        let Some(overlay) = self.overlay.take() else {
            return;
        };
        self.overlay = match overlay {
            Overlay::NamePrompt { mut input } => match code {
                KeyCode::Esc => None,
                KeyCode::Enter => {
                    self.create_file(&input);
                    None
                }
                KeyCode::Backspace => {
                    input.pop();
                    Some(Overlay::NamePrompt { input })
                }
                KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                    input.push(ch);
                    Some(Overlay::NamePrompt { input })
                }
                _ => Some(Overlay::NamePrompt { input }),
            },
            Overlay::FileList(mut list) => match code {
                KeyCode::Esc => None,
                KeyCode::Up => {
                    list.move_selection(-1);
                    Some(Overlay::FileList(list))
                }
                KeyCode::Down => {
                    list.move_selection(1);
                    Some(Overlay::FileList(list))
                }
                KeyCode::Enter => {
                    if let Some((id, _)) = list.current().cloned() {
                        self.open_file(&id);
                    }
                    None
                }
                KeyCode::Delete | KeyCode::Char('d') => match list.current().cloned() {
                    Some((id, name)) => Some(Overlay::ConfirmDelete { id, name }),
                    None => Some(Overlay::FileList(list)),
                },
                KeyCode::Char('C') => Some(Overlay::ConfirmClearAll),
                _ => Some(Overlay::FileList(list)),
            },
            Overlay::ConfirmDelete { id, name } => {
                if matches!(code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    self.delete_file(&id);
                } else {
                    self.set_status(format!("Kept {name}"));
                }
                None
            }
            Overlay::ConfirmClearAll => {
                if matches!(code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    self.clear_all();
                }
                None
            }
            Overlay::ConfirmOverwrite { .. } => {
                if matches!(code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    self.export(true);
                } else {
                    self.set_status("Export cancelled");
                }
                None
            }
            Overlay::Assistant => {
                match code {
                    KeyCode::Esc => return,
                    KeyCode::Enter => self.run_assistant(),
                    KeyCode::Left => self.panel.action = self.panel.action.cycle(-1),
                    KeyCode::Right | KeyCode::Tab => {
                        self.panel.action = self.panel.action.cycle(1);
                    }
                    KeyCode::Char('y') if modifiers.contains(KeyModifiers::CONTROL) => {
                        if self.insert_assistant_output() {
                            return;
                        }
                    }
                    KeyCode::Backspace => {
                        self.panel.instruction.pop();
                    }
                    KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                        self.panel.instruction.push(ch);
                    }
                    _ => {}
                }
                Some(Overlay::Assistant)
            }
        };
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        if area.height == 0 || area.width == 0 {
            return;
        }

        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(area);
        let panes_area = vertical[0];
        let status_area = vertical[1];

        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(34),
                Constraint::Percentage(33),
                Constraint::Percentage(33),
            ])
            .split(panes_area);

        self.draw_editor(frame, panes[0], Pane::Markdown);
        self.draw_editor(frame, panes[1], Pane::Plain);
        self.draw_html(frame, panes[2]);

        let status_line = self.status_line(status_area.width as usize);
        let status_widget = Paragraph::new(status_line).style(self.theme.status_bar_style());
        frame.render_widget(status_widget, status_area);

        match &self.overlay {
            Some(Overlay::NamePrompt { input }) => {
                let text = format!("{input}_");
                self.draw_prompt(frame, area, "Enter filename", &text);
            }
            Some(Overlay::FileList(list)) => self.draw_file_list(frame, area, list),
            Some(Overlay::ConfirmDelete { name, .. }) => {
                let text = format!("Delete \"{name}\"? (y/n)");
                self.draw_prompt(frame, area, "Confirm", &text);
            }
            Some(Overlay::ConfirmClearAll) => {
                self.draw_prompt(frame, area, "Confirm", "Clear all saved files? (y/n)");
            }
            Some(Overlay::ConfirmOverwrite { existing }) => {
                let text = format!("Overwrite {}? (y/n)", existing.join(" and "));
                self.draw_prompt(frame, area, "Confirm", &text);
            }
            Some(Overlay::Assistant) => self.draw_assistant(frame, area),
            None => {}
        }
    }

    fn pane_block(&self, pane: Pane, title: String) -> Block<'static> {
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(self.theme.border_style(self.focus == pane))
            .style(self.theme.pane_style())
    }

    fn draw_editor(&mut self, frame: &mut Frame, area: Rect, pane: Pane) {
        let buffer = match pane {
            Pane::Plain => &self.plain,
            _ => &self.markdown,
        };
        let inner_height = area.height.saturating_sub(2) as usize;
        let inner_width = area.width.saturating_sub(2) as usize;
        let position = buffer.cursor_position();
        let scroll = &mut self.scroll[pane.index()];
        scroll.follow(position.line, position.column, inner_height, inner_width);
        let scroll = *scroll;

        let lines = styled_lines(
            buffer.text(),
            buffer.selection(),
            self.theme.selection_style(),
        );
        let paragraph = Paragraph::new(Text::from(lines))
            .block(self.pane_block(pane, pane.title().to_string()))
            .scroll((scroll.top as u16, scroll.left as u16));
        frame.render_widget(paragraph, area);

        if self.focus == pane && self.overlay.is_none() && inner_width > 0 && inner_height > 0 {
            let x = area.x + 1 + (position.column - scroll.left) as u16;
            let y = area.y + 1 + (position.line - scroll.top) as u16;
            frame.set_cursor_position(Position::new(x, y));
        }
    }

    fn draw_html(&mut self, frame: &mut Frame, area: Rect) {
        let document = self.store.document();
        let failed: Vec<&str> = document
            .render_passes()
            .iter()
            .filter(|report| matches!(report.outcome, PassOutcome::Failed(_)))
            .map(|report| report.pass)
            .collect();
        let title = if failed.is_empty() {
            Pane::Html.title().to_string()
        } else {
            format!("{} ({} failed)", Pane::Html.title(), failed.join(", "))
        };

        let lines = markup_lines(
            document.rendered_html(),
            self.theme.markup_style(),
        );
        let max_top = lines.len().saturating_sub(1);
        let scroll = &mut self.scroll[Pane::Html.index()];
        scroll.top = scroll.top.min(max_top);
        let top = scroll.top as u16;

        let paragraph = Paragraph::new(Text::from(lines))
            .block(self.pane_block(Pane::Html, title))
            .wrap(Wrap { trim: false })
            .scroll((top, 0));
        frame.render_widget(paragraph, area);
    }

    fn status_line(&self, terminal_width: usize) -> Line<'static> {
        if let Some((message, _)) = &self.status_message {
            return Line::from(vec![Span::raw(message.clone())]);
        }

        let position = self.markdown.cursor_position();
        let filename = self
            .store
            .active_record()
            .map(|record| record.name.clone())
            .unwrap_or_else(|| "Untitled".to_string());
        let marker = if self.is_dirty() { "*" } else { "" };
        let words = stats::count_words(self.store.document().markdown_source());
        let word_count = if words.code > 0 {
            format!("{} words ({} in code)", words.total(), words.code)
        } else {
            format!("{} words", words.total())
        };
        let mode = if self.assistant.is_remote() {
            "remote"
        } else {
            "local"
        };

        // Shortcuts ordered from least to most important
        let all_shortcuts = [
            format!("F5:{}", self.theme_preference.toggle_label()),
            "^E:Export".to_string(),
            "F2:Assistant".to_string(),
            "^O:Files".to_string(),
            "^N:New file".to_string(),
            "^S:Save".to_string(),
            "^Q:Quit".to_string(),
        ];

        let mut spans = vec![
            Span::raw(format!("{}:{} ", position.line + 1, position.column + 1)),
            Span::styled(format!("{filename}{marker}"), self.theme.filename_style()),
            Span::raw(format!(", {word_count}, assistant: {mode}")),
        ];
        if let Some(time) = &self.autosaved_at {
            spans.push(Span::raw(format!(", {}", autosave_label(time))));
        }

        let left_width: usize = spans.iter().map(|span| span.content.chars().count()).sum();
        let min_padding = 1;
        let mut shortcuts_to_show: Vec<&str> = Vec::new();
        let mut shortcuts_width = 0;
        for shortcut in all_shortcuts.iter().rev() {
            let test_width = if shortcuts_to_show.is_empty() {
                shortcut.chars().count()
            } else {
                shortcuts_width + 1 + shortcut.chars().count()
            };
            if left_width + min_padding + test_width <= terminal_width {
                shortcuts_to_show.insert(0, shortcut);
                shortcuts_width = test_width;
            } else {
                break;
            }
        }

        if !shortcuts_to_show.is_empty() {
            let padding = terminal_width
                .saturating_sub(left_width)
                .saturating_sub(shortcuts_width)
                .max(min_padding);
            spans.push(Span::raw(" ".repeat(padding)));
            spans.push(Span::raw(shortcuts_to_show.join(" ")));
        }

        Line::from(spans)
    }

    fn draw_prompt(&self, frame: &mut Frame, area: Rect, title: &str, text: &str) {
        let width = (text.chars().count() as u16 + 4)
            .max(30)
            .min(area.width);
        let popup_area = centered(area, width, 3.min(area.height));
        frame.render_widget(Clear, popup_area);
        let paragraph = Paragraph::new(text.to_string()).style(self.theme.menu_style()).block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .style(self.theme.menu_style()),
        );
        frame.render_widget(paragraph, popup_area);
    }

    fn draw_file_list(&self, frame: &mut Frame, area: Rect, list: &FileListState) {
        let width = list
            .entries
            .iter()
            .map(|(_, name)| name.chars().count())
            .max()
            .unwrap_or(0)
            .max(36) as u16
            + 4;
        let height = (list.entries.len().max(1) as u16 + 2).min(area.height);
        let popup_area = centered(area, width.min(area.width), height);
        frame.render_widget(Clear, popup_area);

        let items: Vec<ListItem> = if list.entries.is_empty() {
            vec![ListItem::new(Line::from(Span::styled(
                "No files",
                self.theme.menu_style().add_modifier(Modifier::DIM),
            )))]
        } else {
            list.entries
                .iter()
                .map(|(id, name)| {
                    let active = self.store.active_id() == Some(id.as_str());
                    let label = if active {
                        format!("{name} (active)")
                    } else {
                        name.clone()
                    };
                    ListItem::new(Line::from(label))
                })
                .collect()
        };

        let mut state = ListState::default();
        if !list.entries.is_empty() {
            state.select(Some(list.selected));
        }
        let widget = List::new(items)
            .highlight_style(self.theme.menu_selected_style())
            .style(self.theme.menu_style())
            .block(
                Block::default()
                    .title("Files (Enter open, d delete, C clear all)")
                    .borders(Borders::ALL)
                    .style(self.theme.menu_style()),
            );
        frame.render_stateful_widget(widget, popup_area, &mut state);
    }

    fn draw_assistant(&self, frame: &mut Frame, area: Rect) {
        let width = (area.width * 2 / 3).max(40).min(area.width);
        let height = (area.height * 2 / 3).max(10).min(area.height);
        let popup_area = centered(area, width, height);
        frame.render_widget(Clear, popup_area);

        let mut lines = vec![
            Line::from(vec![
                Span::styled("Action: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(format!("< {} >", self.panel.action.label())),
            ]),
            Line::from(vec![
                Span::styled("Instruction: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(format!("{}_", self.panel.instruction)),
            ]),
            Line::from(Span::styled(
                format!("Selection: {} chars", self.panel.selection.chars().count()),
                self.theme.markup_style(),
            )),
            Line::from(""),
        ];
        let output_style = if self.panel.output.starts_with("OpenAI") {
            self.theme.error_style()
        } else {
            self.theme.menu_style()
        };
        lines.extend(
            self.panel
                .output
                .lines()
                .map(|line| Line::from(Span::styled(line.to_string(), output_style))),
        );

        let paragraph = Paragraph::new(Text::from(lines))
            .wrap(Wrap { trim: false })
            .style(self.theme.menu_style())
            .block(
                Block::default()
                    .title("Assistant (Enter run, ←/→ action, ^Y insert, Esc close)")
                    .borders(Borders::ALL)
                    .style(self.theme.menu_style()),
            );
        frame.render_widget(paragraph, popup_area);
    }
}

/// Applies an editing key to `buffer`. Returns whether the text changed.
fn edit_buffer(buffer: &mut TextBuffer, code: KeyCode, modifiers: KeyModifiers) -> bool {
    let extend = modifiers.contains(KeyModifiers::SHIFT);
    match code {
        KeyCode::Char(ch) => {
            buffer.insert_char(ch);
            true
        }
        KeyCode::Enter => {
            buffer.insert_char('\n');
            true
        }
        KeyCode::Backspace => buffer.backspace(),
        KeyCode::Delete => buffer.delete_forward(),
        KeyCode::Esc => {
            buffer.clear_selection();
            false
        }
        KeyCode::Left => {
            buffer.move_left(extend);
            false
        }
        KeyCode::Right => {
            buffer.move_right(extend);
            false
        }
        KeyCode::Up => {
            buffer.move_vertical(-1, extend);
            false
        }
        KeyCode::Down => {
            buffer.move_vertical(1, extend);
            false
        }
        KeyCode::PageUp => {
            buffer.move_vertical(-20, extend);
            false
        }
        KeyCode::PageDown => {
            buffer.move_vertical(20, extend);
            false
        }
        KeyCode::Home => {
            buffer.move_home(extend);
            false
        }
        KeyCode::End => {
            buffer.move_end(extend);
            false
        }
        _ => false,
    }
}

fn autosave_label(time: &DateTime<Local>) -> String {
    format!("Autosave: {}", time.format("%H:%M:%S"))
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    )
}

fn styled_lines(text: &str, selection: Option<Range<usize>>, selected: Style) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in text.split('\n') {
        let start = offset;
        let end = start + raw.len();
        offset = end + 1;

        let overlap = selection
            .as_ref()
            .map(|range| range.start.max(start)..range.end.min(end))
            .filter(|range| range.start < range.end);
        let line = match overlap {
            Some(range) => Line::from(vec![
                Span::raw(raw[..range.start - start].to_string()),
                Span::styled(raw[range.start - start..range.end - start].to_string(), selected),
                Span::raw(raw[range.end - start..].to_string()),
            ]),
            None => Line::from(raw.to_string()),
        };
        lines.push(line);
    }
    lines
}

/// Splits HTML lines into tag and text spans so tags can be dimmed.
fn markup_lines(html: &str, markup: Style) -> Vec<Line<'static>> {
    html.lines()
        .map(|raw| {
            let mut spans = Vec::new();
            let mut rest = raw;
            while !rest.is_empty() {
                match rest.find('<') {
                    Some(0) => {
                        let close = rest.find('>').map_or(rest.len(), |idx| idx + 1);
                        spans.push(Span::styled(rest[..close].to_string(), markup));
                        rest = &rest[close..];
                    }
                    Some(open) => {
                        spans.push(Span::raw(rest[..open].to_string()));
                        rest = &rest[open..];
                    }
                    None => {
                        spans.push(Span::raw(rest.to_string()));
                        rest = "";
                    }
                }
            }
            Line::from(spans)
        })
        .collect()
}
