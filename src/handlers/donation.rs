use teloxide::types::KeyboardRemove;
use teloxide::utils::html;

use super::Ctx;
use crate::config::DonationAddresses;
use crate::error::Result;
use crate::keyboards;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonationMethod {
    Bitcoin,
    Ethereum,
    Tron,
    Tether,
    Shiba,
    Dogecoin,
    ZarinPal,
}

impl DonationMethod {
    pub const ALL: [DonationMethod; 7] = [
        DonationMethod::Bitcoin,
        DonationMethod::Ethereum,
        DonationMethod::Tron,
        DonationMethod::Tether,
        DonationMethod::Shiba,
        DonationMethod::Dogecoin,
        DonationMethod::ZarinPal,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DonationMethod::Bitcoin => "Bitcoin (BTC)",
            DonationMethod::Ethereum => "Ethereum (ETH)",
            DonationMethod::Tron => "TRON (TRX)",
            DonationMethod::Tether => "Tether (USDT)",
            DonationMethod::Shiba => "Shiba (SHIB)",
            DonationMethod::Dogecoin => "Dogecoin (DOGE)",
            DonationMethod::ZarinPal => "زرین پال",
        }
    }

    /// Exact keyboard labels only. `ZarinPal` is also accepted in Latin script.
    pub fn parse(text: &str) -> Option<DonationMethod> {
        let text = text.trim();
        if text == "ZarinPal" {
            return Some(DonationMethod::ZarinPal);
        }
        Self::ALL.into_iter().find(|method| method.label() == text)
    }

    pub fn is_configured(self, addresses: &DonationAddresses) -> bool {
        let set = |value: &str| !value.is_empty();
        match self {
            DonationMethod::Bitcoin => set(&addresses.btc),
            DonationMethod::Ethereum => set(&addresses.eth),
            DonationMethod::Tron => set(&addresses.trx),
            DonationMethod::Tether => set(&addresses.usdt_trc20) || set(&addresses.usdt_erc20),
            DonationMethod::Shiba => set(&addresses.shiba_bep20) || set(&addresses.shiba_erc20),
            DonationMethod::Dogecoin => set(&addresses.doge),
            DonationMethod::ZarinPal => set(&addresses.zarin_link),
        }
    }

    /// Locale key and its placeholder values.
    fn message(self, addresses: &DonationAddresses) -> (&'static str, Vec<(&'static str, String)>) {
        let e = |value: &str| html::escape(value);
        match self {
            DonationMethod::Bitcoin => ("donateMessageBitcoin", vec![("address", e(&addresses.btc))]),
            DonationMethod::Ethereum => ("donateMessageEthereum", vec![("address", e(&addresses.eth))]),
            DonationMethod::Tron => ("donateMessageTron", vec![("address", e(&addresses.trx))]),
            DonationMethod::Tether => (
                "donateMessageTether",
                vec![
                    ("trc20", e(&addresses.usdt_trc20)),
                    ("erc20", e(&addresses.usdt_erc20)),
                ],
            ),
            DonationMethod::Shiba => (
                "donateMessageShiba",
                vec![
                    ("bep20", e(&addresses.shiba_bep20)),
                    ("erc20", e(&addresses.shiba_erc20)),
                ],
            ),
            DonationMethod::Dogecoin => ("donateMessageDogeCoin", vec![("address", e(&addresses.doge))]),
            DonationMethod::ZarinPal => ("donateMessageZarinPal", vec![("link", e(&addresses.zarin_link))]),
        }
    }
}

pub async fn show_methods(ctx: &Ctx) -> Result<()> {
    let addresses = &ctx.app.config.donation;
    if !DonationMethod::ALL
        .into_iter()
        .any(|method| method.is_configured(addresses))
    {
        ctx.send(ctx.t("noDonationMethods")).await?;
        return Ok(());
    }
    ctx.send_with(ctx.t("donationMessage"), keyboards::donation(addresses))
        .await?;
    Ok(())
}

pub async fn show_address(ctx: &Ctx, method: DonationMethod) -> Result<()> {
    let addresses = &ctx.app.config.donation;
    if !method.is_configured(addresses) {
        return ctx.default_message().await;
    }

    let (key, values) = method.message(addresses);
    let args: Vec<(&str, &str)> = values.iter().map(|(k, v)| (*k, v.as_str())).collect();
    ctx.send_with(ctx.t_args(key, &args), KeyboardRemove::new())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::{t_args, Language};

    #[test]
    fn labels_parse_back() {
        for method in DonationMethod::ALL {
            assert_eq!(DonationMethod::parse(method.label()), Some(method));
        }
        assert_eq!(DonationMethod::parse(" Tether (USDT) "), Some(DonationMethod::Tether));
        assert_eq!(DonationMethod::parse("ZarinPal"), Some(DonationMethod::ZarinPal));
        assert_eq!(DonationMethod::parse("Monero"), None);
    }

    #[test]
    fn bare_coin_names_are_not_labels() {
        for name in ["Bitcoin", "TRON", "Tether", "Shiba", "Dogecoin", "tether (usdt)"] {
            assert_eq!(DonationMethod::parse(name), None, "{name}");
        }
    }

    #[test]
    fn tether_lists_both_networks() {
        let addresses = DonationAddresses {
            usdt_trc20: "T123".into(),
            usdt_erc20: "0x<9>".into(),
            ..DonationAddresses::default()
        };
        let (key, values) = DonationMethod::Tether.message(&addresses);
        let args: Vec<(&str, &str)> = values.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let text = t_args(Language::En, key, &args);
        assert!(text.contains("<code>T123</code>"));
        assert!(text.contains("0x&lt;9&gt;"));
    }
}
