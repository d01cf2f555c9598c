// Child environment construction
use crate::platform::TargetPlatform;
use std::collections::HashMap;
use std::path::Path;

/// Always searched last on Unix, where IDE-launched processes often miss it
const UNIX_EXTRA_PATH: &str = "/usr/local/bin";

/// Environment for a child process.
///
/// `None` overlay means the inherited environment is used untouched (and
/// `None` is returned). Otherwise the inherited variables are merged with
/// the overlay and the path list is normalized for `platform`.
pub fn build_environment(
    platform: TargetPlatform,
    inherited: impl IntoIterator<Item = (String, String)>,
    overlay: Option<&HashMap<String, String>>,
) -> Option<HashMap<String, String>> {
    let overlay = overlay?;

    let mut env: HashMap<String, String> = inherited.into_iter().collect();
    env.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));

    if let Some(key) = path_key(&env, platform) {
        let fixed = match platform {
            TargetPlatform::Windows => windows_path_list(&env[&key]),
            TargetPlatform::Unix => unix_path_list(&env[&key]),
        };
        env.insert(key, fixed);
    }
    Some(env)
}

/// Put `dir` first on the path list, creating it if absent
pub fn prepend_path(platform: TargetPlatform, env: &mut HashMap<String, String>, dir: &Path) {
    let dir = dir.to_string_lossy().into_owned();
    match path_key(env, platform) {
        Some(key) => {
            let current = env[&key].clone();
            env.insert(key, format!("{}{}{}", dir, platform.path_separator(), current));
        }
        None => {
            env.insert(platform.path_var().to_string(), dir);
        }
    }
}

/// Windows variable names are case-insensitive (`Path`, `PATH`)
fn path_key(env: &HashMap<String, String>, platform: TargetPlatform) -> Option<String> {
    match platform {
        TargetPlatform::Unix => env.contains_key("PATH").then(|| "PATH".to_string()),
        TargetPlatform::Windows => env
            .keys()
            .find(|key| key.eq_ignore_ascii_case("path"))
            .cloned(),
    }
}

fn unix_path_list(path: &str) -> String {
    format!("{}:{}", path.replace(';', ":"), UNIX_EXTRA_PATH)
}

/// Make a path list valid on Windows, whether it arrived in Windows or Unix
/// form.
///
/// `C:\my\first;D:\my\second` is kept, `/Users/a:/Users/b` becomes
/// `/Users/a;/Users/b`. Colons after the first backslash of an entry are
/// separators, the drive colon before it is not.
pub fn windows_path_list(path: &str) -> String {
    path.split(';')
        .map(|part| match part.find('\\') {
            None => part.replace(':', ";"),
            Some(index) => {
                let (head, tail) = part.split_at(index);
                format!("{}{}", head, tail.replace(':', ";"))
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inherited() -> Vec<(String, String)> {
        vec![
            ("PATH".to_string(), "/usr/bin;/bin".to_string()),
            ("HOME".to_string(), "/home/dev".to_string()),
        ]
    }

    #[test]
    fn test_no_overlay_inherits_untouched() {
        assert!(build_environment(TargetPlatform::Unix, inherited(), None).is_none());
    }

    #[test]
    fn test_overlay_merged_and_unix_path_fixed() {
        let mut overlay = HashMap::new();
        overlay.insert("JAVA_HOME".to_string(), "/opt/jdk".to_string());
        overlay.insert("HOME".to_string(), "/tmp/home".to_string());

        let env = build_environment(TargetPlatform::Unix, inherited(), Some(&overlay)).unwrap();

        assert_eq!(env["JAVA_HOME"], "/opt/jdk");
        assert_eq!(env["HOME"], "/tmp/home");
        assert_eq!(env["PATH"], "/usr/bin:/bin:/usr/local/bin");
    }

    #[test]
    fn test_empty_overlay_still_normalizes() {
        let env =
            build_environment(TargetPlatform::Unix, inherited(), Some(&HashMap::new())).unwrap();
        assert!(env["PATH"].ends_with(":/usr/local/bin"));
    }

    #[test]
    fn test_windows_path_list() {
        assert_eq!(
            windows_path_list("C:\\my\\first;D:\\my\\second"),
            "C:\\my\\first;D:\\my\\second"
        );
        assert_eq!(
            windows_path_list("/Users/my/first:/Users/my/second"),
            "/Users/my/first;/Users/my/second"
        );
    }

    #[test]
    fn test_windows_path_key_case_insensitive() {
        let inherited = vec![("Path".to_string(), "/a:/b".to_string())];
        let env =
            build_environment(TargetPlatform::Windows, inherited, Some(&HashMap::new())).unwrap();
        assert_eq!(env["Path"], "/a;/b");
    }

    #[test]
    fn test_prepend_path() {
        let mut env = HashMap::new();
        prepend_path(TargetPlatform::Windows, &mut env, Path::new("C:\\tools"));
        assert_eq!(env["Path"], "C:\\tools");

        prepend_path(TargetPlatform::Windows, &mut env, Path::new("C:\\more"));
        assert_eq!(env["Path"], "C:\\more;C:\\tools");
    }
}
