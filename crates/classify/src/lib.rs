use models::{FileChange, FilePatch, PatchKind};

/// Verilog/SystemVerilog source extensions, matched case-insensitively.
pub const HDL_EXTENSIONS: [&str; 4] = ["v", "vh", "sv", "svh"];

/// Directory components that mark HDL files as testbenches. `sim` and
/// `simulation` are deliberately absent: in this ecosystem those
/// directories usually hold infrastructure, not tests.
const TEST_DIR_NAMES: [&str; 11] = [
    "tb",
    "test",
    "tests",
    "testbench",
    "testbenches",
    "verif",
    "verification",
    "bench",
    "dv",
    "uvm",
    "cocotb",
];

/// True when the path carries an HDL extension.
pub fn is_hdl_file(path: &str) -> bool {
    match path.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_ascii_lowercase();
            HDL_EXTENSIONS.iter().any(|e| *e == ext)
        }
        None => false,
    }
}

/// Testbench naming on the basename: `*_tb.sv/.v`, `tb_*.sv/.v`,
/// `*_test.sv/.v`, `*_tb_*.sv/.v`, `*testbench*.sv/.v`.
fn matches_testbench_name(basename: &str) -> bool {
    let name = basename.to_ascii_lowercase();
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return false;
    };
    if ext != "sv" && ext != "v" {
        return false;
    }
    stem.ends_with("_tb")
        || name.starts_with("tb_")
        || stem.ends_with("_test")
        || name.contains("_tb_")
        || name.contains("testbench")
}

/// Any case-folded directory component in the test vocabulary.
fn in_test_directory(path: &str) -> bool {
    let mut components: Vec<&str> = path.split('/').collect();
    components.pop();
    components
        .iter()
        .any(|part| TEST_DIR_NAMES.contains(&part.to_ascii_lowercase().as_str()))
}

/// True when an HDL path looks like a testbench by name or location.
pub fn is_test_file(path: &str) -> bool {
    let basename = path.rsplit('/').next().unwrap_or(path);
    matches_testbench_name(basename) || in_test_directory(path)
}

/// Map a path to code, test, or other. Non-HDL is always `Other`.
pub fn classify_path(path: &str) -> PatchKind {
    if !is_hdl_file(path) {
        return PatchKind::Other;
    }
    if is_test_file(path) {
        PatchKind::Test
    } else {
        PatchKind::Code
    }
}

/// Partition raw API file records into (code, test, other) patch lists.
pub fn classify_files(files: &[FileChange]) -> (Vec<FilePatch>, Vec<FilePatch>, Vec<FilePatch>) {
    let mut code = Vec::new();
    let mut test = Vec::new();
    let mut other = Vec::new();

    for change in files {
        let kind = classify_path(&change.path);
        let patch = FilePatch::from_change(change, kind);
        match kind {
            PatchKind::Code => code.push(patch),
            PatchKind::Test => test.push(patch),
            PatchKind::Other => other.push(patch),
        }
    }

    (code, test, other)
}

/// Fast pre-filter: true as soon as accumulated additions+deletions reach
/// `min_code` on code files and `min_test` on test files. Used to
/// short-circuit expensive fetches.
pub fn has_valid_patches(files: &[FileChange], min_code: u64, min_test: u64) -> bool {
    let mut code_total = 0u64;
    let mut test_total = 0u64;

    for change in files {
        match classify_path(&change.path) {
            PatchKind::Code => code_total += change.additions + change.deletions,
            PatchKind::Test => test_total += change.additions + change.deletions,
            PatchKind::Other => {}
        }
        if code_total >= min_code && test_total >= min_test {
            return true;
        }
    }

    code_total >= min_code && test_total >= min_test
}
