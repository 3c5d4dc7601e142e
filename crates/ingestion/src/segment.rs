//! 分段发现
//!
//! 在输入目录 (及其 `ts_front/`、`ts_rear/` 子目录) 中查找 `*.ts` 分段，
//! 按文件名后缀区分前/后摄像头，按自然序排序，每个 (目录, 角色) 组成一个会话。

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use contracts::{CameraRole, ContractError, SegmentRef};
use tracing::{debug, warn};

/// 按角色识别的子目录
const ROLE_SUBDIRS: [&str; 2] = ["ts_front", "ts_rear"];

/// 一个录制会话：同一目录、同一摄像头的全部分段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// 会话标识 (用作输出目录名)
    pub id: String,

    /// 输入目录
    pub folder: PathBuf,

    pub role: CameraRole,

    /// 按序号排列的分段
    pub segments: Vec<SegmentRef>,
}

impl Session {
    pub fn segment_names(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.file_name.clone()).collect()
    }
}

/// 发现所有输入中的会话
///
/// 输入可以是目录或单个 `.ts` 文件 (其所在目录作为会话目录)。
/// 结果按 (目录, 角色) 排序。
pub fn discover_sessions(inputs: &[PathBuf]) -> Result<Vec<Session>, ContractError> {
    let mut grouped: BTreeMap<(PathBuf, CameraRole), Vec<PathBuf>> = BTreeMap::new();

    for input in inputs {
        let (folder, files) = if input.is_file() {
            let folder = input
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (folder, vec![input.clone()])
        } else if input.is_dir() {
            let mut files = list_segments(input)?;
            for sub in ROLE_SUBDIRS {
                let dir = input.join(sub);
                if dir.is_dir() {
                    files.extend(list_segments(&dir)?);
                }
            }
            (input.clone(), files)
        } else {
            return Err(ContractError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input '{}' does not exist", input.display()),
            )));
        };

        for file in files {
            let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            match CameraRole::from_file_stem(stem) {
                Some(role) => grouped.entry((folder.clone(), role)).or_default().push(file),
                None => warn!(file = %file.display(), "segment name has no _F/_R role suffix, skipping"),
            }
        }
    }

    let mut used_ids: BTreeMap<String, usize> = BTreeMap::new();
    let mut sessions = Vec::with_capacity(grouped.len());
    for ((folder, role), mut files) in grouped {
        files.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
        files.dedup();

        let base = format!("{}_{}", folder_label(&folder), role);
        let count = used_ids.entry(base.clone()).or_insert(0);
        *count += 1;
        let id = if *count == 1 {
            base
        } else {
            format!("{base}_{count}")
        };

        let segments = files
            .into_iter()
            .enumerate()
            .map(|(sequence, path)| SegmentRef {
                file_name: file_name(&path),
                path,
                role,
                sequence: sequence as u32,
            })
            .collect::<Vec<_>>();

        debug!(session = %id, segments = segments.len(), "discovered session");
        sessions.push(Session {
            id,
            folder,
            role,
            segments,
        });
    }

    Ok(sessions)
}

fn list_segments(dir: &Path) -> Result<Vec<PathBuf>, ContractError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_ts = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("ts"));
        if is_ts && path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn folder_label(folder: &Path) -> String {
    let label: String = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".to_string())
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if label.is_empty() {
        "session".to_string()
    } else {
        label
    }
}

/// 自然序比较：数字串按数值比较
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let lhs = take_digits(&mut left);
                let rhs = take_digits(&mut right);
                let lhs_trim = lhs.trim_start_matches('0');
                let rhs_trim = rhs.trim_start_matches('0');
                let ord = lhs_trim
                    .len()
                    .cmp(&rhs_trim.len())
                    .then_with(|| lhs_trim.cmp(rhs_trim));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn natural_order() {
        let mut names = vec!["clip_10_F.ts", "clip_2_F.ts", "clip_1_F.ts", "Clip_3_F.ts"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(
            names,
            vec!["clip_1_F.ts", "clip_2_F.ts", "Clip_3_F.ts", "clip_10_F.ts"]
        );
        assert_eq!(natural_cmp("a01", "a1"), "a01".cmp("a1"));
    }

    #[test]
    fn discovers_sessions_by_role() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("trip");
        fs::create_dir_all(root.join("ts_front")).unwrap();
        fs::create_dir_all(root.join("ts_rear")).unwrap();
        for name in ["0010_F.ts", "0002_F.ts"] {
            fs::write(root.join("ts_front").join(name), b"").unwrap();
        }
        fs::write(root.join("ts_rear").join("0002_R.TS"), b"").unwrap();
        fs::write(root.join("notes.ts"), b"").unwrap();
        fs::write(root.join("cover.jpg"), b"").unwrap();

        let sessions = discover_sessions(&[root.clone()]).unwrap();
        assert_eq!(sessions.len(), 2);

        let front = &sessions[0];
        assert_eq!(front.id, "trip_front");
        assert_eq!(front.role, CameraRole::Front);
        assert_eq!(front.segment_names(), vec!["0002_F.ts", "0010_F.ts"]);
        assert_eq!(front.segments[1].sequence, 1);

        let rear = &sessions[1];
        assert_eq!(rear.id, "trip_rear");
        assert_eq!(rear.segments.len(), 1);
    }

    #[test]
    fn single_file_input() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("0001_F.ts");
        fs::write(&file, b"").unwrap();
        let sessions = discover_sessions(&[file]).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].segments.len(), 1);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = discover_sessions(&[dir.path().join("nope")]);
        assert!(matches!(result, Err(ContractError::Io(_))));
    }
}
