//! Build descriptor for a one-file freeze of a script.

use ppt_core::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// File listing extra modules to bundle, one per line, next to the main script.
pub const HIDDEN_IMPORTS_FILE: &str = "add_libs.txt";

/// Version specifiers stripped from hidden import lines. Two-character
/// operators come first so `>=` is not cut at `>`.
const VERSION_SPECIFIERS: [&str; 7] = ["==", ">=", "<=", "~=", "!=", "<", ">"];

/// A file bundled with the program and the folder it lands in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    pub source: PathBuf,
    /// Destination folder inside the bundle, `/`-separated; `.` is the root.
    pub destination: String,
}

/// Files to bundle: every regular file next to the main script except the
/// script itself goes to the bundle root, and every file under `data_folder`
/// goes under a folder of the same name.
pub fn collect_data_files(main_script: &Path, data_folder: Option<&Path>) -> Result<Vec<DataFile>> {
    let script_dir = parent_dir(main_script);
    let script_name = main_script.file_name();

    let mut files = Vec::new();
    let entries = fs::read_dir(&script_dir).map_err(|e| Error::from_io(e, &script_dir))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::from_io(e, &script_dir))?;
        let file_type = entry.file_type().map_err(|e| Error::from_io(e, &entry.path()))?;
        if file_type.is_file() && Some(entry.file_name().as_os_str()) != script_name {
            files.push(DataFile {
                source: entry.path(),
                destination: ".".to_string(),
            });
        }
    }
    files.sort_by(|a, b| a.source.cmp(&b.source));

    if let Some(folder) = data_folder {
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::InvalidArgument(format!("{} has no folder name", folder.display()))
            })?;

        let mut nested = Vec::new();
        walk_data_folder(folder, &name, &mut nested)?;
        nested.sort_by(|a, b| a.source.cmp(&b.source));
        files.extend(nested);
    }

    log::debug!("Collected {} data file(s)", files.len());
    Ok(files)
}

fn walk_data_folder(dir: &Path, destination: &str, files: &mut Vec<DataFile>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| Error::from_io(e, dir))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::from_io(e, dir))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| Error::from_io(e, &path))?;

        if file_type.is_dir() {
            let child = format!("{}/{}", destination, entry.file_name().to_string_lossy());
            walk_data_folder(&path, &child, files)?;
        } else if file_type.is_file() {
            files.push(DataFile {
                source: path,
                destination: destination.to_string(),
            });
        }
    }
    Ok(())
}

/// Module names listed in `add_libs.txt` next to the script, version
/// specifiers stripped. A missing file means no hidden imports.
pub fn read_hidden_imports(script_dir: &Path) -> Result<Vec<String>> {
    let path = script_dir.join(HIDDEN_IMPORTS_FILE);
    if !path.is_file() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&path).map_err(|e| Error::from_io(e, &path))?;
    let imports: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let cut = VERSION_SPECIFIERS
                .iter()
                .filter_map(|op| line.find(op))
                .min()
                .unwrap_or(line.len());
            line[..cut].trim().to_string()
        })
        .filter(|name| !name.is_empty())
        .collect();

    log::debug!("Read {} hidden import(s) from {}", imports.len(), path.display());
    Ok(imports)
}

/// Everything the freezer needs to build one executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDescriptor {
    pub main_script: PathBuf,
    pub data_files: Vec<DataFile>,
    pub hidden_imports: Vec<String>,
    pub icon: Option<PathBuf>,
    pub hide_console: bool,
}

impl BuildDescriptor {
    pub fn new(main_script: impl Into<PathBuf>) -> Self {
        Self {
            main_script: main_script.into(),
            data_files: Vec::new(),
            hidden_imports: Vec::new(),
            icon: None,
            hide_console: false,
        }
    }

    /// Collect data files and hidden imports from the script's folder.
    pub fn discover(main_script: &Path, data_folder: Option<&Path>) -> Result<Self> {
        if !main_script.is_file() {
            return Err(Error::NotFound(main_script.display().to_string()));
        }
        let mut descriptor = Self::new(main_script);
        descriptor.data_files = collect_data_files(main_script, data_folder)?;
        descriptor.hidden_imports = read_hidden_imports(&parent_dir(main_script))?;
        Ok(descriptor)
    }

    pub fn with_icon(mut self, icon: Option<PathBuf>) -> Self {
        self.icon = icon;
        self
    }

    pub fn with_hide_console(mut self, hide_console: bool) -> Self {
        self.hide_console = hide_console;
        self
    }

    /// Executable name: the main script's stem.
    pub fn name(&self) -> String {
        self.main_script
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string())
    }

    /// Render the freezer spec file.
    pub fn render(&self) -> String {
        let datas = self
            .data_files
            .iter()
            .map(|f| format!("({}, {})", py_path(&f.source), py_str(&f.destination)))
            .collect::<Vec<_>>()
            .join(", ");
        let hidden_imports = self
            .hidden_imports
            .iter()
            .map(|m| py_str(m))
            .collect::<Vec<_>>()
            .join(", ");
        let icon = self
            .icon
            .as_ref()
            .map(|icon| format!("    icon={},\n", py_path(icon)))
            .unwrap_or_default();

        format!(
            "# -*- mode: python ; coding: utf-8 -*-

block_cipher = None

a = Analysis(
    [{script}],
    pathex=[],
    binaries=[],
    datas=[{datas}],
    hiddenimports=[{hidden_imports}],
    hookspath=[],
    runtime_hooks=[],
    excludes=[],
    cipher=block_cipher,
)
pyz = PYZ(a.pure, a.zipped_data, cipher=block_cipher)
exe = EXE(
    pyz,
    a.scripts,
    a.binaries,
    a.datas,
    [],
    name={name},
    debug=False,
    strip=False,
    upx=True,
    console={console},
{icon})
",
            script = py_path(&self.main_script),
            name = py_str(&self.name()),
            console = if self.hide_console { "False" } else { "True" },
        )
    }

    /// Write `<name>.spec` into `dir`, returning its path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(format!("{}.spec", self.name()));
        fs::write(&path, self.render()).map_err(|e| Error::from_io(e, &path))?;
        log::info!("Wrote build descriptor {}", path.display());
        Ok(path)
    }
}

pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// A path as a Python string literal with `/` separators.
fn py_path(path: &Path) -> String {
    py_str(&path.to_string_lossy().replace('\\', "/"))
}

/// A single-quoted Python string literal.
fn py_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
