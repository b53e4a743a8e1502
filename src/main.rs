use iced::widget::{button, column, container, image, row, scrollable, text, Column, Row};
use iced::{Alignment, Element, Length, Task, Theme};
use iced_aw::Wrap;
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

// Declare the state module
mod state;

use state::storage::SqliteStorage;
use state::store::ImageStore;

/// The one store instance, shared by every screen
type SharedStore = Arc<ImageStore<SqliteStorage>>;

/// Supported image file extensions for folder import
const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"];

/// The screens the user can navigate between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Home,
    Capture,
    Gallery,
}

/// Main application state
struct PhotoShelf {
    /// The image reference store, shared with background tasks
    store: SharedStore,
    /// Which screen is currently shown
    screen: Screen,
    /// Snapshot of the store's image list, refreshed after every store operation
    images: Vec<String>,
    /// False until the initial load from storage completes
    ready: bool,
    /// True while an append is persisting (capture buttons are disabled)
    saving: bool,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// Initial load from storage completed with the photo count
    Loaded(usize),
    /// User navigated to another screen
    Navigate(Screen),
    /// User clicked "Add Photo" (single file pick)
    AddPhoto,
    /// User clicked "Import Photos" (multiple file pick)
    ImportPhotos,
    /// User clicked "Import Folder" (recursive scan)
    ImportFolder,
    /// Background append completed with the new total, or an error
    AppendComplete(Result<usize, String>),
    /// User clicked "Clear Gallery"
    ClearGallery,
    /// Background clear completed
    ClearComplete(Result<(), String>),
    /// User asked to re-read the persisted list
    CheckStorage,
    /// Background refresh completed with the persisted photo count
    RefreshComplete(usize),
}

impl PhotoShelf {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        // Initialize the storage backend
        // If this fails, we panic because the app cannot function without its storage
        let storage = SqliteStorage::new()
            .expect("Failed to initialize storage. Check permissions and disk space.");

        let store = Arc::new(ImageStore::new(storage));

        // The store loads exactly once, here, as the startup task
        let load = {
            let store = store.clone();
            async move {
                store.initialize().await;
                store.references().len()
            }
        };

        (
            PhotoShelf {
                store,
                screen: Screen::Home,
                images: Vec::new(),
                ready: false,
                saving: false,
                status: String::from("Loading gallery..."),
            },
            Task::perform(load, Message::Loaded),
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Loaded(count) => {
                self.ready = true;
                self.images = self.store.references();
                self.status = format!("Ready. {} photo(s) on the shelf.", count);
                println!("🖼️  Photo Shelf initialized with {} photo(s)", count);
                Task::none()
            }
            Message::Navigate(screen) => {
                self.screen = screen;
                Task::none()
            }
            Message::AddPhoto => {
                // Show the native file picker dialog
                let file = FileDialog::new()
                    .set_title("Add a Photo")
                    .add_filter("Images", &IMAGE_EXTENSIONS)
                    .pick_file();

                match file {
                    Some(path) => self.start_append(vec![path]),
                    None => Task::none(),
                }
            }
            Message::ImportPhotos => {
                let files = FileDialog::new()
                    .set_title("Import Photos")
                    .add_filter("Images", &IMAGE_EXTENSIONS)
                    .pick_files();

                match files {
                    Some(paths) if !paths.is_empty() => self.start_append(paths),
                    _ => Task::none(),
                }
            }
            Message::ImportFolder => {
                let folder = FileDialog::new()
                    .set_title("Select Folder with Photos")
                    .pick_folder();

                let Some(folder_path) = folder else {
                    return Task::none();
                };

                println!("🔍 Scanning folder: {}", folder_path.display());
                let found = collect_image_files(&folder_path);

                if found.is_empty() {
                    self.status = format!("No image files found in {}", folder_path.display());
                    return Task::none();
                }

                self.start_append(found)
            }
            Message::AppendComplete(Ok(total)) => {
                self.saving = false;
                self.images = self.store.references();
                self.status = format!("✅ Saved! {} photo(s) on the shelf.", total);
                Task::none()
            }
            Message::AppendComplete(Err(error)) => {
                // Nothing was persisted and the store mirror is unchanged
                self.saving = false;
                self.status = format!("❌ Could not save photos: {}", error);
                Task::none()
            }
            Message::ClearGallery => {
                let confirmed = MessageDialog::new()
                    .set_level(MessageLevel::Warning)
                    .set_title("Clear Gallery")
                    .set_description("Delete all photos from the shelf?")
                    .set_buttons(MessageButtons::YesNo)
                    .show();

                if confirmed != MessageDialogResult::Yes {
                    return Task::none();
                }

                let store = self.store.clone();
                Task::perform(
                    async move { store.clear().await.map_err(|e| e.to_string()) },
                    Message::ClearComplete,
                )
            }
            Message::ClearComplete(result) => {
                // The mirror is empty either way; only the status differs
                self.images = self.store.references();
                self.status = match result {
                    Ok(()) => String::from("🗑️  Gallery cleared."),
                    Err(error) => format!(
                        "⚠️  Gallery cleared on screen, but storage removal failed: {}",
                        error
                    ),
                };
                Task::none()
            }
            Message::CheckStorage => {
                let store = self.store.clone();
                Task::perform(
                    async move {
                        store.refresh().await;
                        store.references().len()
                    },
                    Message::RefreshComplete,
                )
            }
            Message::RefreshComplete(count) => {
                self.images = self.store.references();
                self.status = format!("🔄 Storage has {} photo(s).", count);
                Task::none()
            }
        }
    }

    /// Launch a background task that appends the picked paths to the store
    fn start_append(&mut self, paths: Vec<PathBuf>) -> Task<Message> {
        let references: Vec<String> = paths
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();

        self.saving = true;
        self.status = format!("Saving {} photo(s)...", references.len());

        let store = self.store.clone();
        Task::perform(
            async move {
                store
                    .append_batch(references)
                    .await
                    .map_err(|e| e.to_string())
            },
            Message::AppendComplete,
        )
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        if !self.ready {
            return centered(
                column![text("Loading gallery...").size(24)]
                    .spacing(20)
                    .align_x(Alignment::Center),
            );
        }

        match self.screen {
            Screen::Home => self.view_home(),
            Screen::Capture => self.view_capture(),
            Screen::Gallery => self.view_gallery(),
        }
    }

    fn view_home(&self) -> Element<Message> {
        let content: Column<Message> = column![
            text("Photo Shelf").size(48),
            text("Add photos and keep them on your shelf").size(16),
            button("📷 Capture & Import")
                .on_press(Message::Navigate(Screen::Capture))
                .padding(10),
            button("📂 View Gallery")
                .on_press(Message::Navigate(Screen::Gallery))
                .padding(10),
            text(&self.status).size(16),
        ]
        .spacing(20)
        .align_x(Alignment::Center);

        centered(content)
    }

    fn view_capture(&self) -> Element<Message> {
        let pick_buttons: Row<Message> = row![
            button("📸 Add Photo")
                .on_press_maybe((!self.saving).then_some(Message::AddPhoto))
                .padding(15),
            button("🖼️  Import Photos")
                .on_press_maybe((!self.saving).then_some(Message::ImportPhotos))
                .padding(15),
            button("📁 Import Folder")
                .on_press_maybe((!self.saving).then_some(Message::ImportFolder))
                .padding(15),
        ]
        .spacing(15);

        let mut content: Column<Message> = column![
            text("📷 Capture & Import").size(32),
            text(format!("{} photo(s) saved", self.images.len())).size(16),
            button("🔄 Check Storage")
                .on_press(Message::CheckStorage)
                .padding(8),
            pick_buttons,
            button(text(format!("📂 View Gallery ({})", self.images.len())))
                .on_press(Message::Navigate(Screen::Gallery))
                .padding(12),
            text(&self.status).size(14),
        ]
        .spacing(18)
        .padding(30)
        .align_x(Alignment::Center);

        if self.saving {
            content = content.push(text("💾 Saving photos...").size(16));
        }

        content = content.push(self.recent_strip());

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .into()
    }

    /// A strip of the most recently added photos, newest last
    fn recent_strip(&self) -> Element<Message> {
        if self.images.is_empty() {
            return column![
                text("Nothing here yet...").size(16),
                text("Your photos will appear here").size(12),
            ]
            .spacing(5)
            .align_x(Alignment::Center)
            .into();
        }

        let recent = self
            .images
            .iter()
            .skip(self.images.len().saturating_sub(10));

        let mut strip: Row<Message> = row![].spacing(10);
        for uri in recent {
            strip = strip.push(
                image(image::Handle::from_path(uri))
                    .width(Length::Fixed(80.0))
                    .height(Length::Fixed(80.0)),
            );
        }

        column![
            text(format!("Recent Photos ({} in total)", self.images.len())).size(18),
            strip,
        ]
        .spacing(10)
        .align_x(Alignment::Center)
        .into()
    }

    fn view_gallery(&self) -> Element<Message> {
        // Empty gallery gets its own centered screen
        if self.images.is_empty() {
            let content = column![
                text("🖼️").size(64),
                text("Gallery Empty").size(28),
                text("No photos saved yet. Capture or import some!").size(16),
                button("📸 Go to Capture")
                    .on_press(Message::Navigate(Screen::Capture))
                    .padding(12),
            ]
            .spacing(15)
            .align_x(Alignment::Center);

            return centered(content);
        }

        let mut grid = Wrap::new().spacing(10.0).line_spacing(10.0);
        for uri in &self.images {
            grid = grid.push(
                image(image::Handle::from_path(uri))
                    .width(Length::Fixed(200.0))
                    .height(Length::Fixed(150.0)),
            );
        }

        let content: Column<Message> = column![
            text("📁 Photo Gallery").size(32),
            text(format!("{} photo(s)", self.images.len())).size(16),
            row![
                button("🗑️  Clear Gallery")
                    .on_press(Message::ClearGallery)
                    .padding(10),
                button("📷 Back to Capture")
                    .on_press(Message::Navigate(Screen::Capture))
                    .padding(10),
            ]
            .spacing(15),
            scrollable(grid).height(Length::Fill),
        ]
        .spacing(18)
        .padding(25)
        .align_x(Alignment::Center);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Center content on both axes
fn centered(content: Column<Message>) -> Element<Message> {
    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}

fn main() -> iced::Result {
    iced::application("Photo Shelf", PhotoShelf::update, PhotoShelf::view)
        .theme(PhotoShelf::theme)
        .centered()
        .run_with(PhotoShelf::new)
}

/// Recursively collect image files from a folder
fn collect_image_files(folder_path: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();

    // Walk the directory tree recursively
    for entry in WalkDir::new(folder_path)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        // Only process files (not directories)
        if !path.is_file() {
            continue;
        }

        // Check if this is an image file by extension
        let Some(extension) = path.extension() else {
            continue;
        };
        let ext = extension.to_string_lossy().to_lowercase();
        if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }

        found.push(path.to_path_buf());
    }

    println!(
        "📋 Found {} image file(s) under {}",
        found.len(),
        folder_path.display()
    );

    found
}
