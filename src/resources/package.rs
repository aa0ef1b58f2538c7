//! RG-006: Package resource handler (apt, dnf, yum, zypper).

use crate::core::types::Resource;

/// Generate shell script to check if packages are installed.
pub fn check_script(resource: &Resource) -> String {
    let provider = resource.provider.as_deref().unwrap_or("apt");
    let packages = &resource.packages;

    let checks: Vec<String> = packages
        .iter()
        .map(|p| match provider {
            "apt" => format!(
                "dpkg -l '{}' >/dev/null 2>&1 && echo 'installed:{}' || echo 'missing:{}'",
                p, p, p
            ),
            "dnf" | "yum" | "zypper" => format!(
                "rpm -q '{}' >/dev/null 2>&1 && echo 'installed:{}' || echo 'missing:{}'",
                p, p, p
            ),
            _ => format!("echo 'unsupported provider: {}'", provider),
        })
        .collect();
    checks.join("\n")
}

/// Generate shell script to install or remove packages.
pub fn apply_script(resource: &Resource) -> String {
    let provider = resource.provider.as_deref().unwrap_or("apt");
    let packages = &resource.packages;
    let state = resource.state.as_deref().unwrap_or("present");

    let pkg_list: Vec<String> = packages.iter().map(|p| format!("'{}'", p)).collect();
    let joined = pkg_list.join(" ");

    match (provider, state) {
        ("apt", "present") => format!(
            "set -euo pipefail\n\
             NEED_INSTALL=0\n\
             for pkg in {joined}; do\n\
               dpkg -l \"$pkg\" >/dev/null 2>&1 || NEED_INSTALL=1\n\
             done\n\
             if [ \"$NEED_INSTALL\" = \"1\" ]; then\n\
               apt-get update -qq\n\
               DEBIAN_FRONTEND=noninteractive apt-get install -y -qq {joined}\n\
             fi\n\
             # Postcondition: all packages installed\n\
             for pkg in {joined}; do\n\
               dpkg -l \"$pkg\" >/dev/null 2>&1\n\
             done"
        ),
        ("apt", "absent") => format!(
            "set -euo pipefail\n\
             NEED_REMOVE=0\n\
             for pkg in {joined}; do\n\
               dpkg -l \"$pkg\" >/dev/null 2>&1 && NEED_REMOVE=1\n\
             done\n\
             if [ \"$NEED_REMOVE\" = \"1\" ]; then\n\
               DEBIAN_FRONTEND=noninteractive apt-get remove -y -qq {joined}\n\
             fi"
        ),
        ("dnf" | "yum" | "zypper", "present") => {
            let install = match provider {
                "dnf" => "dnf install -y -q",
                "yum" => "yum install -y -q",
                _ => "zypper --non-interactive install",
            };
            format!(
                "set -euo pipefail\n\
                 NEED_INSTALL=0\n\
                 for pkg in {joined}; do\n\
                   rpm -q \"$pkg\" >/dev/null 2>&1 || NEED_INSTALL=1\n\
                 done\n\
                 if [ \"$NEED_INSTALL\" = \"1\" ]; then\n\
                   {install} {joined}\n\
                 fi\n\
                 # Postcondition: all packages installed\n\
                 for pkg in {joined}; do\n\
                   rpm -q \"$pkg\" >/dev/null 2>&1\n\
                 done"
            )
        }
        ("dnf" | "yum" | "zypper", "absent") => {
            let remove = match provider {
                "dnf" => "dnf remove -y -q",
                "yum" => "yum remove -y -q",
                _ => "zypper --non-interactive remove",
            };
            format!(
                "set -euo pipefail\n\
                 NEED_REMOVE=0\n\
                 for pkg in {joined}; do\n\
                   rpm -q \"$pkg\" >/dev/null 2>&1 && NEED_REMOVE=1\n\
                 done\n\
                 if [ \"$NEED_REMOVE\" = \"1\" ]; then\n\
                   {remove} {joined}\n\
                 fi"
            )
        }
        _ => format!("echo 'unsupported: provider={}, state={}'", provider, state),
    }
}

/// Generate shell to query installed versions (for state hashing).
pub fn state_query_script(resource: &Resource) -> String {
    let provider = resource.provider.as_deref().unwrap_or("apt");
    let packages = &resource.packages;

    let queries: Vec<String> = packages
        .iter()
        .map(|p| match provider {
            "apt" => format!(
                "dpkg-query -W -f '${{Package}}=${{Version}}\\n' '{}' 2>/dev/null || echo '{}=MISSING'",
                p, p
            ),
            "dnf" | "yum" | "zypper" => format!(
                "rpm -q --qf '%{{NAME}}=%{{VERSION}}\\n' '{}' 2>/dev/null || echo '{}=MISSING'",
                p, p
            ),
            _ => "echo 'unknown'".to_string(),
        })
        .collect();
    queries.join("\n")
}
