// ABOUTME: Post-boot setup script for fresh lab instances
// ABOUTME: Installs course software, a browser-facing RDP web gateway, and enables RDP

use base64::{engine::general_purpose::STANDARD, Engine};

const PACKAGE_MANAGER_INSTALLER: &str = "https://community.chocolatey.org/install.ps1";
const WEB_GATEWAY_INSTALLER: &str =
    "https://github.com/cedrozor/myrtille/releases/download/v2.9.3/Myrtille_2.9.3_x86_x64_Setup.exe";
const WEB_GATEWAY_PORT: u16 = 8080;

/// Build the base64-encoded setup script a fresh instance runs on first boot.
/// Restored instances skip this; their disk already carries the result.
pub fn build_setup_script(software: &[String]) -> String {
    let packages = software.join(" ");
    let script = format!(
        r#"
# Install package manager
Set-ExecutionPolicy Bypass -Scope Process -Force;
[System.Net.ServicePointManager]::SecurityProtocol = [System.Net.ServicePointManager]::SecurityProtocol -bor 3072;
iex ((New-Object System.Net.WebClient).DownloadString('{installer}'));

# Install course software
choco install {packages} -y --no-progress;

# Install the HTML5 RDP web gateway
$gatewayUrl = "{gateway}";
$installerPath = "C:\Temp\gateway-setup.exe";
New-Item -ItemType Directory -Force -Path C:\Temp;
Invoke-WebRequest -Uri $gatewayUrl -OutFile $installerPath;
Start-Process -FilePath $installerPath -ArgumentList "/VERYSILENT /SUPPRESSMSGBOXES /NORESTART" -Wait;

# Open the gateway port
New-NetFirewallRule -DisplayName "Lab Web Gateway" -Direction Inbound -Protocol TCP -LocalPort {port} -Action Allow;

# Enable RDP
Set-ItemProperty -Path 'HKLM:\System\CurrentControlSet\Control\Terminal Server' -name "fDenyTSConnections" -value 0;
Enable-NetFirewallRule -DisplayGroup "Remote Desktop";

# Restart IIS so the gateway is served
iisreset;
"#,
        installer = PACKAGE_MANAGER_INSTALLER,
        packages = packages,
        gateway = WEB_GATEWAY_INSTALLER,
        port = WEB_GATEWAY_PORT,
    );

    STANDARD.encode(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(encoded: &str) -> String {
        String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap()
    }

    #[test]
    fn test_script_installs_requested_packages() {
        let encoded = build_setup_script(&[
            "git".to_string(),
            "googlechrome".to_string(),
            "vscode".to_string(),
        ]);
        let script = decode(&encoded);
        assert!(script.contains("choco install git googlechrome vscode -y --no-progress"));
    }

    #[test]
    fn test_script_enables_remote_access() {
        let script = decode(&build_setup_script(&["git".to_string()]));
        assert!(script.contains("fDenyTSConnections"));
        assert!(script.contains("LocalPort 8080"));
        assert!(script.contains("iisreset"));
    }

    #[test]
    fn test_script_is_valid_base64() {
        let encoded = build_setup_script(&[]);
        assert!(STANDARD.decode(&encoded).is_ok());
        assert!(!encoded.contains('\n'));
    }
}
