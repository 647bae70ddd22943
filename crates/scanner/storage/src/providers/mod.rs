mod account_provider;
pub(crate) use account_provider::AccountProvider;

mod block_provider;
pub(crate) use block_provider::BlockProvider;

mod transaction_provider;
pub(crate) use transaction_provider::TransactionProvider;

mod settings_provider;
pub(crate) use settings_provider::SettingsProvider;
