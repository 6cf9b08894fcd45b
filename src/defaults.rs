//! Default exclusion tables, one per category.
//!
//! Glob entries (anything containing `*`, `?` or `[`) match a basename, a
//! stem or the whole root-relative path. Every other entry is literal text
//! and matches a contiguous run of path segments.

/// Always-on bucket: build output, dependency caches, logs and secrets.
pub const BUILD_ARTIFACTS: &[&str] = &[
    "build",
    "bin",
    "dist",
    "node_modules",
    "target",
    "vendor",
    "out",
    "coverage",
    "venv",
    "DerivedData",
    "Pods",
    "Carthage/Build",
    "coverage.out",
    "logs",
    "*.log",
    "*.tmp",
    "secrets",
    "*.key",
    "*.pem",
];

pub const TESTS: &[&str] = &[
    "tests",
    "test",
    "__tests__",
    "test_*",
    "*_test.*",
    "*.test",
    "*.test.*",
    "*.spec.*",
    "conftest.py",
];

pub const LOCK_FILES: &[&str] = &[
    "*.lock",
    "package-lock.json",
    "pnpm-lock.yaml",
    "go.sum",
    "bun.lockb",
    "Package.resolved",
    "gradle.lockfile",
    "packages.lock.json",
];

pub const BINARY_EXTENSIONS: &[&str] = &[
    "*.pyc", "*.pyo", "*.pyd", "*.exe", "*.dll", "*.app", "*.deb", "*.rpm", "*.dot",
    // archives
    "*.zip", "*.tar", "*.gz", "*.bz2", "*.xz", "*.7z", "*.rar", "*.jar", "*.war", "*.ear",
    // media
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.bmp", "*.ico", "*.svg", "*.mp3", "*.mp4", "*.avi",
    "*.mov", "*.wav", "*.pdf",
    // data
    "*.db", "*.sqlite", "*.sqlite3", "*.dat", "*.bin",
    "*.swp", "*.swo",
    "*.class", "*.o", "*.so", "*.dylib", "*.node", "*.wasm", "*.zst", "*.lz",
    // fonts
    "*.ttf", "*.otf", "*.woff", "*.woff2", "*.eot",
    "*.obj", "*.lib", "*.pdb", "*.ilk",
    "*.dmg", "*.pkg", "*.msi", "*.apk", "*.ipa",
    "*.h5", "*.hdf5", "*.npz", "*.npy", "*.mat", "*.parquet", "*.feather", "*.arrow",
];

pub const DOCS: &[&str] = &["*.md", "*.rst", "*.mdx"];

pub const DEPENDENCY_MANIFESTS: &[&str] = &[
    "package.json",
    "pyproject.toml",
    "requirements.txt",
    "requirements-*.txt",
    "setup.py",
    "setup.cfg",
    "Pipfile",
    "environment.yml",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "Cargo.toml",
    "go.mod",
    "Gemfile",
    "composer.json",
    "Podfile",
    "pubspec.yaml",
    "Package.swift",
    "*.csproj",
];

pub const CONFIG: &[&str] = &[
    "*.json", "*.jsonc", "*.json5", "*.yaml", "*.yml", "*.toml", "*.ini", "*.cfg", "*.conf",
    "*.properties", "*.xml", "*.env",
];

pub const SCRIPTS: &[&str] = &[
    "scripts", "*.sh", "*.bash", "*.zsh", "*.fish", "*.ps1", "*.bat", "*.cmd",
];

pub const STYLESHEETS: &[&str] = &["*.css", "*.scss", "*.sass", "*.less", "*.styl"];

/// Ignore-file names consulted in every directory, lowest precedence first.
pub const IGNORE_FILE_NAMES: &[&str] = &[".gitignore", ".ignore", ".prinignore"];

/// Upper bound on entries kept by the on-disk fetch cache.
pub const FETCH_CACHE_MAX_ENTRIES: usize = 2048;
