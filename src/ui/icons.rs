//! Shared UI icons and emojis.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static STOP: Emoji<'_, '_> = Emoji("⏹️  ", "[STOP]");

// Artifact indicators
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static FILE_NEW: Emoji<'_, '_> = Emoji("📄 ", "+");
pub static FILE_MOD: Emoji<'_, '_> = Emoji("📝 ", "~");
pub static BUG: Emoji<'_, '_> = Emoji("🐛 ", "!");

// Phase indicators
pub static PLAN: Emoji<'_, '_> = Emoji("🧭 ", "[PLAN]");
pub static CODE: Emoji<'_, '_> = Emoji("⌨️  ", "[CODE]");
pub static TEST: Emoji<'_, '_> = Emoji("🔍 ", "[TEST]");
pub static REFINE: Emoji<'_, '_> = Emoji("🔄 ", "[FIX]");
pub static PROGRESS: Emoji<'_, '_> = Emoji("📊 ", "[PROG]");
pub static AGENT: Emoji<'_, '_> = Emoji("🤖 ", "> ");
